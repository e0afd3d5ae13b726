//! Settings file generation
//!
//! Builds the PHP script that rewrites a Drupal release's settings file with
//! the resolved database configuration, using Drupal's own
//! `drupal_rewrite_settings()`.

use crate::engine::ConfigTree;
use crate::source::{php, SourceLocation};

pub const DEFAULT_TEMPLATE: &str = "sites/default/default.settings.php";

/// Where a pre-existing default settings file is parked while the template is installed
pub const BACKUP_PATH: &str = "/tmp/default_settings_backup.php";

pub const GENERATED_BY: &str = "Generated by dbdeploy";

/// PHP-serialized settings payload (standard keys only)
#[must_use]
pub fn settings_payload(databases: &ConfigTree) -> String {
    php::serialize(&databases.standard_settings())
}

/// Script installing `template` as the settings file and injecting `databases`
#[must_use]
pub fn settings_script(release: &str, template: &str, databases: &ConfigTree) -> String {
    let template = SourceLocation::resolve(template, release).php_path();
    let release = php::single_quote(release);
    let payload = php::single_quote(&settings_payload(databases));

    format!(
        r#"<?php
define('DRUPAL_ROOT', '{release}');
define('MAINTENANCE_MODE', 'install');

$template = {template};
$default = DRUPAL_ROOT.'/{DEFAULT_TEMPLATE}';
$backup = '{BACKUP_PATH}';

$databases = unserialize('{payload}');
$settings['databases'] = array('comment' => '{GENERATED_BY}',
                               'value' => $databases);

require_once(DRUPAL_ROOT.'/includes/bootstrap.inc');
require_once(DRUPAL_ROOT.'/includes/install.inc');

$backed_up = false;
if ($template != $default && file_exists($default)) {{
  rename($default, $backup);
  $backed_up = true;
}}
rename($template, $default);
drupal_rewrite_settings($settings);
if ($backed_up) {{
  rename($backup, $default);
}}
"#
    )
}
