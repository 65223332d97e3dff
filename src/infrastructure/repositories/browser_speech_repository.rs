use serde::{Deserialize, Serialize};

/// What the page hands to `window.speechSynthesis` when the browser tier
/// serves a request. No audio is produced server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSpeech {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

/// Terminal voice tier, delegated to the visitor's browser.
///
/// Whether the browser can speak is only known from the request itself, so
/// the capability is passed in per call rather than detected once.
#[derive(Debug, Clone)]
pub struct BrowserSpeechRepository {
    lang: String,
    rate: f32,
    pitch: f32,
}

impl BrowserSpeechRepository {
    pub fn new(lang: String) -> Self {
        Self {
            lang,
            rate: 1.0,
            pitch: 1.0,
        }
    }

    /// `None` when the browser reported no speech synthesis support
    pub fn instruct(&self, text: &str, supported: bool) -> Option<ClientSpeech> {
        if !supported {
            return None;
        }

        Some(ClientSpeech {
            text: text.to_string(),
            lang: self.lang.clone(),
            rate: self.rate,
            pitch: self.pitch,
        })
    }
}
