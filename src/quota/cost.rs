//! Deterministic cost estimates for analytics and billing.

// self
use crate::{_prelude::*, error::ConfigError};

/// Unit prices applied by [`CostRates::estimate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostRates {
	/// Speech-to-text price per audio minute.
	pub stt_per_minute: f64,
	/// Flat price charged per translation.
	pub flat_per_translation: f64,
	/// Text-to-speech price per thousand synthesized characters.
	pub tts_per_thousand_chars: f64,
}
impl CostRates {
	/// Estimated cost of one translation, rounded to three decimal places.
	pub fn estimate(&self, audio_minutes: f64, synthesized_characters: u64) -> f64 {
		round3(
			audio_minutes * self.stt_per_minute
				+ self.flat_per_translation
				+ (synthesized_characters as f64 / 1000.0) * self.tts_per_thousand_chars,
		)
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		let rates = [self.stt_per_minute, self.flat_per_translation, self.tts_per_thousand_chars];

		if rates.iter().any(|rate| !rate.is_finite() || *rate < 0.0) {
			return Err(ConfigError::InvalidQuota { reason: "cost rates must be finite and non-negative" });
		}

		Ok(())
	}
}
impl Default for CostRates {
	fn default() -> Self {
		Self { stt_per_minute: 0.006, flat_per_translation: 0.002, tts_per_thousand_chars: 0.30 }
	}
}

/// [`CostRates::estimate`] with the default rates.
pub fn estimate_cost(audio_minutes: f64, synthesized_characters: u64) -> f64 {
	CostRates::default().estimate(audio_minutes, synthesized_characters)
}

/// Rounds to three decimal places.
pub fn round3(value: f64) -> f64 {
	(value * 1000.0).round() / 1000.0
}
