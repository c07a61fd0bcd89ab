pub mod backend;
pub mod claude;
pub mod error;
pub mod openai;
pub mod schema;
pub mod traits;
pub mod util;

pub use backend::{AiBackend, BackendKind};
pub use claude::Claude;
pub use error::AiError;
pub use openai::OpenAi;
pub use schema::strict_schema;
pub use traits::{
    EmbedAgent, ImageInput, JsonSchemaSpec, Message, MessageRole, StructuredCompletion,
};
pub use util::{strip_code_blocks, truncate_to_char_boundary};
