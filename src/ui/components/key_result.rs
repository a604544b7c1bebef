/// Outcome of offering a key to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Used, nothing for the parent to do
  Handled,
  /// Used, and the parent has something to act on
  Event(T),
  /// Not used; try the next handler
  NotHandled,
}
