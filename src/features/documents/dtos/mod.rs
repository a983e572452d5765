mod document_dto;

pub use document_dto::{
    DeleteDocumentResponseDto, DocumentResponseDto, DuplicateMatchDto, UploadDocumentDto,
    UploadResponseDto,
};
