//! Text instructions sent alongside the input images.

pub const IDENTITY_AND_REALISM_RULES: &str = "
**HYPER-REALISM & DERMATOLOGICAL FIDELITY PROTOCOL**

1.  **IDENTITY LOCK:** Preserve facial structure, moles, scars, and bone structure.
2.  **SKIN BIOLOGY:** Render individual pores, fine lines, and natural skin oils. ABSOLUTELY NO \"beauty filters\" or smoothing.
3.  **PHOTOGRAPHIC QUALITY:** Mimic 85mm portrait lens. Apply subtle organic film grain. Use subsurface scattering for skin glow.
";

pub fn normalize_prompt() -> String {
    format!(
        "{IDENTITY_AND_REALISM_RULES}\n**TASK:** Transform subject into a Neutral Studio Model. White background."
    )
}

pub fn fit_garment_prompt(color: Option<&str>) -> String {
    let color_line = match color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(color) => format!("\n**COLOR OVERRIDE:** Change garment to {color}."),
        None => String::new(),
    };
    format!(
        "{IDENTITY_AND_REALISM_RULES}\n**TASK:** Virtual Try-On. Fit garment to model body perfectly. {color_line}"
    )
}

pub fn pose_prompt(pose_instruction: &str) -> String {
    format!(
        "{IDENTITY_AND_REALISM_RULES}\n**POSE TASK:** Regenerate same person in pose: \"{pose_instruction}\"."
    )
}
