//! A loaded file or folder, and a typed reference to one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::file::File;
use crate::folder::Folder;
use crate::permission::ResourceType;

/// Typed reference to a file or folder by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type.
    pub resource_type: ResourceType,
    /// Resource ID.
    pub id: Uuid,
}

impl ResourceRef {
    /// Reference a file.
    pub fn file(id: Uuid) -> Self {
        Self {
            resource_type: ResourceType::File,
            id,
        }
    }

    /// Reference a folder.
    pub fn folder(id: Uuid) -> Self {
        Self {
            resource_type: ResourceType::Folder,
            id,
        }
    }
}

/// A loaded resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resource {
    /// A file record.
    File(File),
    /// A folder record.
    Folder(Folder),
}

impl Resource {
    /// The resource ID.
    pub fn id(&self) -> Uuid {
        match self {
            Self::File(f) => f.id,
            Self::Folder(f) => f.id,
        }
    }

    /// The resource owner.
    pub fn owner_id(&self) -> Uuid {
        match self {
            Self::File(f) => f.owner_id,
            Self::Folder(f) => f.owner_id,
        }
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        match self {
            Self::File(f) => &f.name,
            Self::Folder(f) => &f.name,
        }
    }

    /// The containing folder, if any.
    pub fn parent_id(&self) -> Option<Uuid> {
        match self {
            Self::File(f) => f.folder_id,
            Self::Folder(f) => f.parent_id,
        }
    }

    /// Whether the resource is in the trash.
    pub fn is_deleted(&self) -> bool {
        match self {
            Self::File(f) => f.is_deleted,
            Self::Folder(f) => f.is_deleted,
        }
    }

    /// The resource type.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::File(_) => ResourceType::File,
            Self::Folder(_) => ResourceType::Folder,
        }
    }

    /// A typed reference to this resource.
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            resource_type: self.resource_type(),
            id: self.id(),
        }
    }
    /// The file record, if this is a file.
    pub fn into_file(self) -> Option<File> {
        match self {
            Self::File(f) => Some(f),
            Self::Folder(_) => None,
        }
    }

    /// The folder record, if this is a folder.
    pub fn into_folder(self) -> Option<Folder> {
        match self {
            Self::Folder(f) => Some(f),
            Self::File(_) => None,
        }
    }
}
