use std::io::Cursor;
use std::path::Path;

use google_drive3::api::{File, Scope};
use google_drive3::{hyper_rustls, hyper_util, yup_oauth2, DriveHub};
use tokio::runtime::Handle;

use super::storage::{ContainerRef, StorageError, StorageGateway, StoredFile};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: i32 = 100;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Thin wrapper around the generated google-drive3 client allowing synchronous
/// workflows to interact with Drive without exposing async details.
///
/// Calls block on the runtime handle the client was built with, so they must be
/// made from a blocking thread (`spawn_blocking`), never from async code.
pub struct GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    runtime: Handle,
}

impl<C> GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, runtime: Handle) -> Self {
        Self { hub, runtime }
    }

    pub fn with_current_runtime(hub: DriveHub<C>) -> Result<Self, StorageError> {
        let runtime = Handle::try_current().map_err(|err| StorageError::Runtime(err.to_string()))?;
        Ok(Self::new(hub, runtime))
    }

    fn map_error<E: std::fmt::Display>(err: E) -> StorageError {
        StorageError::Backend(err.to_string())
    }

    fn fetch_file(&self, file_id: &str) -> Result<File, StorageError> {
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .get(file_id)
                .param("fields", "id,name,parents")
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit()
                .await
        });

        let (_, file) = result.map_err(Self::map_error)?;
        Ok(file)
    }

    fn update_parents(&self, item_id: &str, add: &str, remove: &str) -> Result<(), StorageError> {
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .update(File::default(), item_id)
                .add_parents(add)
                .remove_parents(remove)
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit_without_upload()
                .await
        });

        result.map(|_| ()).map_err(Self::map_error)
    }

    fn query_folders(&self, query: &str) -> Result<Vec<ContainerRef>, StorageError> {
        let mut containers = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let result = self.runtime.block_on(async {
                let mut call = self
                    .hub
                    .files()
                    .list()
                    .q(query)
                    .param("fields", "nextPageToken,files(id,name,webViewLink)")
                    .page_size(PAGE_SIZE)
                    .include_items_from_all_drives(true)
                    .supports_all_drives(true)
                    .add_scope(Scope::Full);
                if let Some(token) = page_token.as_deref() {
                    call = call.page_token(token);
                }
                call.doit().await
            });

            let (_, file_list) = result.map_err(Self::map_error)?;
            for file in file_list.files.unwrap_or_default() {
                containers.push(container_from(file, "")?);
            }

            match file_list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(containers)
    }
}

impl GoogleDriveClient<HttpsConnector> {
    /// Builds a client authenticated with a service-account key file.
    pub async fn from_service_account_key<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let key = yup_oauth2::read_service_account_key(path.as_ref())
            .await
            .map_err(Self::map_error)?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(Self::map_error)?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(Self::map_error)?
            .https_or_http()
            .enable_http1()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);

        Self::with_current_runtime(DriveHub::new(client, auth))
    }
}

impl<C> std::fmt::Debug for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveClient").finish_non_exhaustive()
    }
}

impl<C> StorageGateway for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn create_container(&self, parent_id: &str, name: &str) -> Result<ContainerRef, StorageError> {
        let metadata = File {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: Some(vec![parent_id.to_string()]),
            ..File::default()
        };

        let content_type: mime::Mime = FOLDER_MIME_TYPE.parse().map_err(Self::map_error)?;

        // Folders carry no content; the empty body keeps the upload metadata-only.
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .create(metadata)
                .param("fields", "id,name,webViewLink")
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .upload(Cursor::new(Vec::<u8>::new()), content_type)
                .await
        });

        let (_, folder) = result.map_err(Self::map_error)?;
        container_from(folder, name)
    }

    fn get_file(&self, file_id: &str) -> Result<StoredFile, StorageError> {
        let file = self.fetch_file(file_id)?;
        let name = file.name.ok_or_else(|| StorageError::NotFound {
            kind: "file name for",
            id: file_id.to_string(),
        })?;
        Ok(StoredFile {
            id: file.id.unwrap_or_else(|| file_id.to_string()),
            name,
            parents: file.parents.unwrap_or_default(),
        })
    }

    fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), StorageError> {
        let metadata = File {
            name: Some(new_name.to_string()),
            ..File::default()
        };

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .update(metadata, file_id)
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit_without_upload()
                .await
        });

        result.map(|_| ()).map_err(Self::map_error)
    }

    fn move_file(&self, file: &StoredFile, destination: &ContainerRef) -> Result<(), StorageError> {
        self.update_parents(&file.id, &destination.id, &file.parents.join(","))
    }

    fn list_containers(&self, parent_id: &str) -> Result<Vec<ContainerRef>, StorageError> {
        self.query_folders(&format!(
            "'{}' in parents and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
            escape_query(parent_id)
        ))
    }

    fn find_container(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<ContainerRef>, StorageError> {
        let matches = self.query_folders(&format!(
            "'{}' in parents and name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
            escape_query(parent_id),
            escape_query(name)
        ))?;
        Ok(matches.into_iter().next())
    }

    fn move_container(
        &self,
        container: &ContainerRef,
        from_parent_id: &str,
        to_parent_id: &str,
    ) -> Result<(), StorageError> {
        self.update_parents(&container.id, to_parent_id, from_parent_id)
    }
}

/// Converts a Drive folder resource into a container reference. A folder
/// without an id cannot be addressed later, so it is an error.
fn container_from(folder: File, requested_name: &str) -> Result<ContainerRef, StorageError> {
    let id = folder
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StorageError::Backend("Drive returned a folder without an id".to_string()))?;
    Ok(ContainerRef {
        id,
        name: folder.name.unwrap_or_else(|| requested_name.to_string()),
        url: folder.web_view_link,
    })
}

/// Escapes a literal for use inside a single-quoted Drive query string.
fn escape_query(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}
