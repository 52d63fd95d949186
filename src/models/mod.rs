//! Data models for the Gemini API.
//!
//! Only the request/response fields the orchestration layer inspects or
//! forwards are modelled here; everything else passes through untouched.

// Author: kelexine (https://github.com/kelexine)

pub mod gemini;

pub use gemini::{
    Candidate, Content, FinishReason, GenerateContentResponse, GenerateRequest, GenerationConfig,
    Part, SafetyRating, SafetySetting, Tool, UsageMetadata,
};
