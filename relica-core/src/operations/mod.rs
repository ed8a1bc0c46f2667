pub mod delete_file;
pub mod put_file;
pub mod put_replica;
pub mod read_file;

pub use delete_file::{
    DeleteFileOperation, DeleteFileOperationOutcome, DeleteFileOperationRequest,
};
pub use put_file::{
    PutFileOperation, PutFileOperationRequest, PutFileOperationResult, WriteKind,
};
pub use put_replica::{
    PutReplicaOperation, PutReplicaOperationRequest, PutReplicaOperationResult,
};
pub use read_file::{
    ReadFileOperation, ReadFileOperationOutcome, ReadFileOperationRequest,
    ReadFileOperationResult,
};
