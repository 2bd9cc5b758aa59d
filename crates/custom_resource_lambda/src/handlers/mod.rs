//! Request dispatch and the panic boundary around handler code.

pub mod dispatch;
pub mod fault;
