pub mod assembler;
pub mod cycle;
pub mod parser;
pub mod ranker;
pub mod render;
pub mod social;
pub mod sources;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod verifier;

pub use assembler::{assemble, Publisher};
pub use cycle::{BranchOutcome, CycleReport, DigestCycle};
pub use parser::{parse, ParseError, ParsedResponse};
pub use ranker::merge_and_rank;
pub use sources::SourceClient;
pub use store::{FileDigestStore, PgDigestStore};
pub use traits::{DigestStore, SocialSignalSource, UrlProbe};
pub use verifier::{CitationCheck, CitationVerifier, HttpProbe, TrustList, ValidityMap};
