// Strategy analysis: the three task flows (questionnaire, SWOT, action plan).
// Flow per request: upload → record lookup → evidence → prompt → generation
//                   → PDF render → artifact store → JSON response.
// All generation goes through the TextGenerator held by the pipeline.

pub mod handlers;
pub mod pipeline;
pub mod upload;
