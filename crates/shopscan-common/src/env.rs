/// Boolean switch values accepted by every `*_RESET` / `SKIP_*` style variable:
/// `1`, `true`, `yes` or `on`, in any case. Anything else is off.
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
