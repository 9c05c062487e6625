use crate::fingerprint::DEFAULT_BLOCK_SIZE;
use crate::resolver::DateRule;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub sorted_dir_name: String,
    pub merged_suffix: String,
    pub organize_log_name: String,
    pub merge_log_name: String,
    pub collect_dir_name: String,
    pub collect_log_name: String,
    pub date_rule: DateRule,
    /// Extra EXIF tags tried after the standard date tags, by name or number.
    pub locale_date_tags: Vec<String>,
    pub hash_block_size: usize,
    pub census_threshold: usize,
    pub census_extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_extensions: to_strings(&[
                "jpg", "jpeg", "png", "heic", "heif", "tif", "tiff", "bmp", "gif", "webp",
            ]),
            video_extensions: to_strings(&[
                "mp4", "mov", "avi", "mkv", "wmv", "flv", "mpeg", "mpg",
            ]),
            sorted_dir_name: "sorted".to_string(),
            merged_suffix: "_merged".to_string(),
            organize_log_name: "organize_log.csv".to_string(),
            merge_log_name: "merge_log.csv".to_string(),
            collect_dir_name: "00_collect_media".to_string(),
            collect_log_name: "00_collect_media_log.csv".to_string(),
            date_rule: DateRule::Earliest,
            locale_date_tags: to_strings(&["Aufnahmedatum"]),
            hash_block_size: DEFAULT_BLOCK_SIZE,
            census_threshold: 8,
            census_extensions: to_strings(&["jpg", "jpeg", "heic", "heif"]),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "mediasort", "mediasort")
        .context("could not determine the OS configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let paths = app_paths()?;
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "could not create config directory: {}",
            paths.config_dir.display()
        )
    })?;
    save_config_to(config, &paths.config_path)?;
    Ok(paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let body = toml::to_string_pretty(config).context("could not serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("could not write config file: {}", path.display()))?;
    Ok(())
}
