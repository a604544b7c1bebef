mod command_input;
mod confirm;
mod form;
mod input;
mod key_result;
mod picker;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::{ConfirmDialog, ConfirmEvent};
pub use form::{Form, FormEvent};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use picker::{Picker, PickerEvent, PickerItem};
pub use search_input::{SearchEvent, SearchInput};
