/// A renderable style layer bound to one source.
pub trait Layer {
    fn id(&self) -> &str;

    fn source(&self) -> &str;

    /// Whether clicks on this layer report features.
    fn pickable(&self) -> bool {
        false
    }
}
