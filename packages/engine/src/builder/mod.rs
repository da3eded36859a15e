//! Fluent entry point for certificate validation and generation
//!
//! ```no_run
//! use sslward_engine::Ssl;
//!
//! let result = Ssl::certificate()
//!     .validator()
//!     .from_files("./ssl/server.crt", "./ssl/server.key")
//!     .domains(&["example.com", "www.example.com"])
//!     .validate();
//! println!("{}", result.status);
//! ```

pub mod generator;
pub mod validator;

pub use generator::{GeneratorBuilder, GeneratorWithDomain};
pub use validator::{ValidatorBuilder, ValidatorWithInput};

/// Main entry point for certificate operations
pub struct Ssl;

impl Ssl {
    /// Work with certificates (validate or generate)
    #[must_use]
    pub fn certificate() -> CertificateBuilder {
        CertificateBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateBuilder;

impl CertificateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn validator(self) -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    #[must_use]
    pub fn generator(self) -> GeneratorBuilder {
        GeneratorBuilder::new()
    }
}
