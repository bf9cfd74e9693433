//! Bindery engine: turns paginated web articles into one EPUB archive.
//!
//! Stages, in the order a run drives them: [`PaginationStitcher`] (fetch
//! and [`Classifier`]), [`ImageHarvester`], [`Normalizer`], and finally
//! [`EpubArchive`]. [`Pipeline`] strings them together.
mod article;
mod classify;
mod cookies;
mod dates;
mod decode;
mod epub;
mod error;
mod fetch;
mod filename;
mod images;
mod links;
mod markup;
mod normalize;
mod paginate;
mod persist;
mod pipeline;
mod rules;
mod types;
mod xhtml;

pub use article::{
    Article, ArticleDate, ContentNode, Fragment, ImageRef, ImageStatus, PageMetadata, RawPage,
    UNTITLED,
};
pub use classify::{ClassifiedPage, Classifier, CODE_BLOCK_CLASS};
pub use cookies::{cookie_header, load_cookie_file, parse_cookies, CookieError, SessionCookie};
pub use dates::{display_or_raw, format_display_date, DateLocale};
pub use decode::{decode_html, DecodedHtml};
pub use epub::{assemble, ArchiveMetadata, AssemblyError, EpubArchive, IMAGE_DIR};
pub use error::{ErrorKind, ExtractionError};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{archive_filename, book_identifier, default_archive_filename, image_filename};
pub use images::{HarvestOutput, ImageHarvester};
pub use links::{absolutize_href, resolve_url};
pub use markup::{escape_attr, escape_text};
pub use normalize::{Normalizer, SOURCE_MARKER};
pub use paginate::{CollectedArticle, PageFailure, PaginationStitcher};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{
    Disposition, ExtractedArticle, FailureEntry, OutputDescriptor, Pipeline, RunError, RunReport,
};
pub use rules::{CompiledRules, RulesError, SiteRules, TextReplacement};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, ResourceKind};
pub use xhtml::to_xhtml;
