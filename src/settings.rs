use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Depth of the frame-resource ring. Zero is rejected when the engine is
    /// constructed, not silently repaired here.
    #[serde(default = "EngineSettings::default_frames_in_flight")]
    pub frames_in_flight: u32,
    #[serde(default = "EngineSettings::default_sample_count")]
    pub sample_count: u32,
    /// Initial viewport; scissor is derived from it. `None` uses the full
    /// render-target extent.
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default = "EngineSettings::default_bindless_capacity")]
    pub bindless_capacity: u32,
    #[serde(default = "EngineSettings::default_object_capacity")]
    pub initial_object_capacity: u32,
    #[serde(default = "EngineSettings::default_draw_capacity")]
    pub initial_draw_capacity: u32,
    /// Seed for the shader-visible per-frame jitter sequence. Never consulted
    /// by any cache.
    #[serde(default)]
    pub jitter_seed: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: Self::default_frames_in_flight(),
            sample_count: Self::default_sample_count(),
            viewport: None,
            bindless_capacity: Self::default_bindless_capacity(),
            initial_object_capacity: Self::default_object_capacity(),
            initial_draw_capacity: Self::default_draw_capacity(),
            jitter_seed: 0,
        }
    }
}

impl EngineSettings {
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<EngineSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded engine settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default engine settings.",
                        path, err
                    );
                    EngineSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("Engine settings file {:?} not found. Using defaults.", path);
                EngineSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default engine settings.",
                    path, err
                );
                EngineSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.sample_count == 0 {
            warn!("Sample count must be greater than zero. Using 1 instead.");
            self.sample_count = Self::default_sample_count();
        }

        if self.bindless_capacity == 0 {
            warn!("Bindless capacity must be greater than zero. Using default value.");
            self.bindless_capacity = Self::default_bindless_capacity();
        }

        if self.initial_object_capacity == 0 {
            self.initial_object_capacity = Self::default_object_capacity();
        }

        if self.initial_draw_capacity == 0 {
            self.initial_draw_capacity = Self::default_draw_capacity();
        }

        if let Some(viewport) = &self.viewport {
            if viewport.width <= 0.0 || viewport.height <= 0.0 {
                warn!("Viewport extent must be positive. Using the full target instead.");
                self.viewport = None;
            }
        }

        self
    }

    const fn default_frames_in_flight() -> u32 {
        2
    }

    const fn default_sample_count() -> u32 {
        1
    }

    const fn default_bindless_capacity() -> u32 {
        256
    }

    const fn default_object_capacity() -> u32 {
        1024
    }

    const fn default_draw_capacity() -> u32 {
        256
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }

    /// Scissor rectangle derived from the viewport bounds.
    pub fn scissor(&self) -> (u32, u32, u32, u32) {
        (
            self.x.max(0.0) as u32,
            self.y.max(0.0) as u32,
            self.width.max(0.0) as u32,
            self.height.max(0.0) as u32,
        )
    }
}
