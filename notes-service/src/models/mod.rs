pub mod note;

pub use note::{CreateNote, Note, NoteTransformer, UpdateNote};
