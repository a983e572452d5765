mod dossier_dto;

pub use dossier_dto::{
    AddNoteDto, AvailableDocumentDto, DossierStateResponseDto, LinkDocumentDto, LinkFolderDto,
    UnlinkResponseDto, UpdateDossierStateDto,
};
