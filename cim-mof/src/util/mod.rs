/*!
 This module defines utilities shared by the MOF decoders.
*/

pub mod cursor;
pub mod dates;
