use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioSettings,
    pub upload: UploadSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub segment_duration_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadSettings {
    pub endpoint: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "recital-capture".to_string(),
            },
            audio: AudioSettings {
                sample_rate: 16000,
                channels: 1,
                segment_duration_secs: 5,
            },
            upload: UploadSettings {
                endpoint: "http://localhost:8000/recordings".to_string(),
            },
        }
    }
}
