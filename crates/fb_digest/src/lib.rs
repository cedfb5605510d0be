pub mod card;
pub mod locale;
pub mod renderer;
pub mod summary;

pub use card::{Card, CardElement, CardHeader, CardText};
pub use locale::Locale;
pub use renderer::{Digest, DigestRenderer};
pub use summary::{escape_markdown, short_summary};

pub mod prelude {
    pub use super::{Digest, DigestRenderer, Locale};
}
