use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// User preferences and Cloudinary credentials, stored as TOML under the
/// platform config directory. Environment variables win over the file so a
/// credential never has to be written to disk.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
  pub cloud_name: Option<String>,
  pub upload_preset: Option<String>,
  pub loop_enabled: Option<bool>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "vidshelf") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "vidshelf") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }

  /// Cloudinary account name. A placeholder is returned when unset so the app
  /// still starts; the upload request will fail with a clear message instead.
  pub fn cloud_name(&self) -> String {
    std::env::var("VIDSHELF_CLOUD_NAME")
      .ok()
      .or_else(|| self.cloud_name.clone())
      .unwrap_or_else(|| "your-cloud-name".to_string())
  }

  /// Cloudinary unsigned upload preset, same fallback rules as `cloud_name`.
  pub fn upload_preset(&self) -> String {
    std::env::var("VIDSHELF_UPLOAD_PRESET")
      .ok()
      .or_else(|| self.upload_preset.clone())
      .unwrap_or_else(|| "your-upload-preset".to_string())
  }
}
