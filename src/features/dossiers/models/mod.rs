mod dossier;
mod dossier_event;

pub use dossier::{
    Dossier, DossierFolderLink, DossierLink, DossierStateUpdate, NewDossierFolderLink,
    NewDossierLink,
};
pub use dossier_event::{DossierEvent, DossierEventKind, DossierEventRow, NewDossierEvent};
