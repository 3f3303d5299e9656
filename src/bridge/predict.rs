// Next-note prediction - skyline request, logits validation and nucleus sampling

use super::BridgeError;
use super::seed::continuation_point;
use super::skyline::{Token, VOCAB_SIZE, skyline_tokens, token_ids};
use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::suggestion::SuggestedNote;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default nucleus mass kept when sampling
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Payload sent to the prediction service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRequest {
    pub input_ids: Vec<u32>,
}

impl PredictionRequest {
    /// Skyline encoding of the grid
    pub fn from_grid(grid: &NoteGrid, catalog: &InstrumentCatalog) -> Self {
        Self {
            input_ids: token_ids(&skyline_tokens(grid, catalog)),
        }
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Next-token logits returned by the prediction service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResponse {
    pub logits: Vec<f64>,
}

impl PredictionResponse {
    /// Parse and validate a service reply
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let response: Self = serde_json::from_str(text)?;
        response.validate()?;
        Ok(response)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.logits.is_empty() {
            return Err(BridgeError::EmptyLogits);
        }
        if self.logits.len() != VOCAB_SIZE {
            return Err(BridgeError::VocabularyMismatch {
                expected: VOCAB_SIZE,
                found: self.logits.len(),
            });
        }
        if let Some(index) = self.logits.iter().position(|l| !l.is_finite()) {
            return Err(BridgeError::NonFiniteLogit(index));
        }
        Ok(())
    }

    /// Sample a token with nucleus sampling
    pub fn sample<R: Rng + ?Sized>(&self, top_p: f64, temperature: f64, rng: &mut R) -> Token {
        sample_top_p(&self.logits, top_p, temperature, rng)
            .and_then(|id| Token::from_id(id as u32))
            .unwrap_or(Token::Pad)
    }
}

/// Nucleus (top-p) sampling over raw logits
///
/// Logits are divided by `temperature`, turned into probabilities, and the
/// smallest set of most likely tokens whose mass reaches `top_p` is sampled
/// from. Returns `None` for empty input.
pub fn sample_top_p<R: Rng + ?Sized>(
    logits: &[f64],
    top_p: f64,
    temperature: f64,
    rng: &mut R,
) -> Option<usize> {
    if logits.is_empty() {
        return None;
    }
    let temperature = temperature.max(1e-8);
    let scaled: Vec<f64> = logits.iter().map(|l| l / temperature).collect();
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scaled.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    let sum = if sum > 0.0 { sum } else { 1.0 };

    let mut ranked: Vec<(usize, f64)> = exps.iter().map(|e| e / sum).enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept = Vec::new();
    let mut cumulative = 0.0;
    for (index, p) in ranked {
        kept.push((index, p));
        cumulative += p;
        if cumulative >= top_p {
            break;
        }
    }
    let kept_sum: f64 = kept.iter().map(|(_, p)| p).sum();
    let kept_sum = if kept_sum > 0.0 { kept_sum } else { 1.0 };

    let r: f64 = rng.gen_range(0.0..1.0);
    let mut acc = 0.0;
    for &(index, p) in &kept {
        acc += p / kept_sum;
        if r <= acc {
            return Some(index);
        }
    }
    kept.first().map(|(index, _)| *index)
}

/// Turn a sampled token into a suggestion for `instrument`
///
/// Only pitch tokens produce a suggestion. It sits at the continuation point
/// wrapped into the grid, on the instrument pitch nearest to the token.
pub fn suggestion_from_token(
    token: Token,
    grid: &NoteGrid,
    catalog: &InstrumentCatalog,
    instrument: usize,
) -> Option<SuggestedNote> {
    let Token::Pitch(midi) = token else {
        return None;
    };
    let target = catalog.get(instrument)?;
    Some(SuggestedNote {
        instrument,
        pitch: target.nearest_to_midi(midi),
        step: continuation_point(grid) % grid.step_count(),
        length: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn logits_favoring(id: usize) -> Vec<f64> {
        let mut logits = vec![-10.0; VOCAB_SIZE];
        logits[id] = 10.0;
        logits
    }

    #[test]
    fn test_request_uses_skyline_ids() {
        let catalog = InstrumentCatalog::chiptune();
        let mut grid = NoteGrid::for_catalog(&catalog, 4);
        grid.toggle(0, 0, 1);

        let request = PredictionRequest::from_grid(&grid, &catalog);
        assert_eq!(request.input_ids, vec![1, 63, 2, 2]);
        assert_eq!(request.to_json().unwrap(), r#"{"input_ids":[1,63,2,2]}"#);
    }

    #[test]
    fn test_response_validation() {
        assert!(matches!(
            PredictionResponse::parse(r#"{"logits": []}"#),
            Err(BridgeError::EmptyLogits)
        ));
        assert!(matches!(
            PredictionResponse::parse(r#"{"logits": [0.1, 0.2]}"#),
            Err(BridgeError::VocabularyMismatch { found: 2, .. })
        ));
        assert!(matches!(
            PredictionResponse::parse(r#"{"probs": []}"#),
            Err(BridgeError::Json(_))
        ));

        let mut response = PredictionResponse {
            logits: logits_favoring(5),
        };
        assert!(response.validate().is_ok());
        response.logits[7] = f64::NAN;
        assert!(matches!(
            response.validate(),
            Err(BridgeError::NonFiniteLogit(7))
        ));
    }

    #[test]
    fn test_sample_dominant_token() {
        let mut rng = StdRng::seed_from_u64(7);
        let logits = logits_favoring(63);
        for _ in 0..20 {
            assert_eq!(sample_top_p(&logits, 0.9, 1.0, &mut rng), Some(63));
        }
    }

    #[test]
    fn test_sample_respects_nucleus() {
        let mut rng = StdRng::seed_from_u64(42);
        // Two tokens share almost all the mass; the third must never appear
        let logits = vec![5.0, 5.0, -5.0];
        for _ in 0..200 {
            let index = sample_top_p(&logits, 0.9, 1.0, &mut rng).unwrap();
            assert!(index < 2);
        }
        assert_eq!(sample_top_p(&[], 0.9, 1.0, &mut rng), None);
    }

    #[test]
    fn test_suggestion_from_token() {
        let catalog = InstrumentCatalog::chiptune();
        let mut grid = NoteGrid::for_catalog(&catalog, 16);
        grid.create_sustained(0, 0, 0, 3);

        // E5 on the square lead (C4..B4) snaps to B4
        let suggestion = suggestion_from_token(Token::Pitch(76), &grid, &catalog, 0).unwrap();
        assert_eq!(suggestion.step, 4);
        assert_eq!(suggestion.pitch, 11);

        assert!(suggestion_from_token(Token::Rest, &grid, &catalog, 0).is_none());
        assert!(suggestion_from_token(Token::Hold, &grid, &catalog, 0).is_none());
        assert!(suggestion_from_token(Token::Pitch(60), &grid, &catalog, 9).is_none());
    }

    #[test]
    fn test_suggestion_wraps_continuation_point() {
        let catalog = InstrumentCatalog::chiptune();
        let mut grid = NoteGrid::for_catalog(&catalog, 16);
        grid.create_sustained(1, 0, 12, 15);

        let suggestion = suggestion_from_token(Token::Pitch(40), &grid, &catalog, 1).unwrap();
        assert_eq!(suggestion.step, 0);
        assert_eq!(suggestion.pitch, 4);
    }
}
