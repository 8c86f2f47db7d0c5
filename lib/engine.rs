use anyhow::Result;

/// Runs source text and renders the completion value.
pub trait Engine {
    /// Renders the result the way `console.log` would print it.
    fn run(&mut self, input: &str) -> Result<String>;
}
