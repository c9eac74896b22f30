/// Return the contents of the first ```python fenced block in `text`, if any.
///
/// Only the first block is considered. An opening fence with no matching
/// closing fence counts as no match rather than an error, so a reply that
/// got cut off mid-block never arms the execution gate.
pub fn first_python_block(text: &str) -> Option<String> {
    let (_, rest) = text.split_once("```python\n")?;
    let (code, _) = rest.split_once("```")?;
    Some(code.to_string())
}
