/*!
 Errors that can happen when deserializing MOF data.
*/

pub mod mof;
