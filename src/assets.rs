//! Front-end asset bundles for the admin UI
//!
//! A bundle is a fixed list of script and style paths relative to its
//! source folder. The vendor bundle carries one locale-dependent script,
//! so the admin language is resolved by the caller and passed in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity setting holding the admin UI language
pub const LANGUAGE_SETTING: &str = "luyadminlanguage";

/// Logged-in admin user, as far as asset selection cares
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AdminIdentity {
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl AdminIdentity {
    pub fn with_language(language: &str) -> Self {
        let mut settings = HashMap::new();
        settings.insert(LANGUAGE_SETTING.to_string(), language.to_string());
        Self { settings }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Admin UI language: the identity's preference, else `default`.
/// Guests (no identity) always get `default`.
pub fn resolve_language<'a>(identity: Option<&'a AdminIdentity>, default: &'a str) -> &'a str {
    identity
        .and_then(|identity| identity.setting(LANGUAGE_SETTING))
        .filter(|language| !language.trim().is_empty())
        .unwrap_or(default)
}

/// Ordered script and style paths served from `source_path`
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    source_path: String,
    css: Vec<String>,
    js: Vec<String>,
    /// Index into `js` of the locale-specific script, if the bundle has one
    #[serde(skip)]
    locale_index: Option<usize>,
}

impl AssetBundle {
    /// Vendor scripts of the admin UI with the angular locale for `language`
    pub fn bower_vendor(language: &str) -> Self {
        let js = vec![
            "jquery-ui/jquery-ui.min.js".to_string(),
            "angular/angular.min.js".to_string(),
            format!("angular-i18n/angular-locale_{}.js", language),
            "angular-ui-router/release/angular-ui-router.min.js".to_string(),
            "angular-dragdrop/src/angular-dragdrop.min.js".to_string(),
            "angular-loading-bar/build/loading-bar.min.js".to_string(),
            "angular-slugify/angular-slugify.js".to_string(),
            "twig.js/twig.min.js".to_string(),
            "ng-wig/dist/ng-wig.min.js".to_string(),
            "ng-file-upload/ng-file-upload.min.js".to_string(),
            "ng-file-upload/ng-file-upload-shim.min.js".to_string(),
            "angular-filter.min.js".to_string(),
            "angular-datepicker/datepicker.min.js".to_string(),
            "angular-chosen/angular-chosen.min.js".to_string(),
        ];

        Self {
            source_path: "@admin/resources/bowervendor".to_string(),
            css: vec!["angular-chosen/chosen.min.css".to_string()],
            js,
            locale_index: Some(2),
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn css(&self) -> &[String] {
        &self.css
    }

    pub fn js(&self) -> &[String] {
        &self.js
    }

    /// The one script whose name depends on the language
    pub fn locale_script(&self) -> Option<&str> {
        self.locale_index
            .and_then(|index| self.js.get(index))
            .map(String::as_str)
    }

    /// Every style then every script, joined to `base_url`
    pub fn urls(&self, base_url: &str) -> Vec<String> {
        let base = base_url.trim_end_matches('/');
        self.css
            .iter()
            .chain(self.js.iter())
            .map(|path| format!("{}/{}", base, path))
            .collect()
    }
}
