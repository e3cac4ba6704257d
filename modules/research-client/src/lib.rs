pub mod error;
pub mod grok;
pub mod openai;
pub mod perplexity;
pub mod traits;
pub mod util;

pub use error::ResearchError;
pub use openai::ChatResearcher;
pub use traits::{Message, MessageRole, ResearchAgent};
pub use util::{strip_code_fence, truncate_to_char_boundary};
