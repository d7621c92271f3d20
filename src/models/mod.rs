//! Data models for Libris

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookQuery, CreateBook, PageRequest, Pagination, UpdateBook};
pub use loan::{CreateLoan, Loan, LoanDetails, LoanFilter, LoanQuery, LoanStatus, LoanWithBook, NewLoan};
pub use user::{NewUser, Role, SessionGrant, TokenRotation, User, UserClaims};
