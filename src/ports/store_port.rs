//! Persistence port for the book (ledger, journal and snapshots).

use crate::domain::book::{Book, Change};
use crate::domain::error::TradegateError;

pub trait BookStore {
    /// A consistent, verified read of the whole book.
    fn load(&self) -> Result<Book, TradegateError>;

    /// Run `op` against the current book inside one exclusive transaction and
    /// commit the changes it returns. Nothing is written if `op` fails.
    /// Returns the book with the changes applied.
    fn transact(
        &self,
        op: &mut dyn FnMut(&Book) -> Result<Vec<Change>, TradegateError>,
    ) -> Result<Book, TradegateError>;
}
