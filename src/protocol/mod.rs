/*!
 * Remote service access
 */

pub mod dataverse;
pub mod uri;

pub use uri::ServiceEndpoint;
