//! Prompt composition for identity-preserving edits.

/// Always prepended so edits keep the subject recognisable.
pub const FACE_PRESERVATION_PREFIX: &str =
    "Preserve the person's facial features, identity, and likeness exactly.";

/// Negative prompt sent with every generation.
pub const NEGATIVE_PROMPT: &str = "distorted face, disfigured face, ugly face, deformed face, \
     bad anatomy, extra limbs, missing limbs, blurry, low quality, \
     watermark, text, signature";

/// Strip surrounding whitespace and quote characters.
pub fn sanitize(text: &str) -> &str {
    text.trim().trim_matches('"').trim_matches('\'')
}

/// Build the full positive prompt from an instruction and optional style
/// prompt.
pub fn build_prompt(instruction: &str, system_prompt: Option<&str>) -> String {
    let instruction = sanitize(instruction);
    match system_prompt.map(sanitize).filter(|s| !s.is_empty()) {
        Some(style) => format!("{FACE_PRESERVATION_PREFIX} {style} {instruction}"),
        None => format!("{FACE_PRESERVATION_PREFIX} {instruction}"),
    }
}
