/// Persistence collaborators: staged file output and an in-memory store
use crate::atlas::PackedTexture;
use crate::capture::{Channel, PixelFormat};
use crate::dds_writer::{read_packed_dds, write_packed_dds};
use crate::error::BakeError;
use crate::manifest::ImpostorManifest;
use crate::proxy::ProxyMesh;
use crate::true_impostor::TrueImpostorManifest;
use image::{ImageFormat, RgbaImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Opaque reference to a stored asset, relative to its store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stores bake products. Writes are staged until `commit`; `discard`
/// drops everything staged since the last commit. Re-storing a name
/// overwrites the previous asset.
pub trait Persistence {
    fn store_texture(&mut self, texture: &PackedTexture, name: &str)
    -> Result<AssetHandle, BakeError>;
    fn store_mesh(&mut self, mesh: &ProxyMesh, name: &str) -> Result<AssetHandle, BakeError>;
    fn store_manifest(
        &mut self,
        manifest: &ImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError>;
    fn store_true_impostor_manifest(
        &mut self,
        manifest: &TrueImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError>;
    fn commit(&mut self) -> Result<(), BakeError>;
    fn discard(&mut self);
    /// Reloads a committed texture.
    fn load_texture(&self, handle: &AssetHandle, channel: Channel)
    -> Result<PackedTexture, BakeError>;
}

/// A 2D colour atlas is stored as PNG; float and layered textures as DDS.
fn texture_file_name(texture: &PackedTexture, name: &str) -> String {
    if texture.format() == PixelFormat::Rgba8 && texture.layers == 1 {
        format!("{}.png", name)
    } else {
        format!("{}.dds", name)
    }
}

/// Writes assets into one output directory. Each store goes to a
/// `.partial` file that is renamed into place on commit.
pub struct FilePersistence {
    output_dir: PathBuf,
    /// Final file name -> staging path.
    staged: Vec<(String, PathBuf)>,
}

impl FilePersistence {
    pub fn new(output_dir: &Path) -> Result<Self, BakeError> {
        fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            staged: Vec::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    fn staging_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.partial", file_name))
    }

    fn stage(&mut self, file_name: String, staging: PathBuf) -> AssetHandle {
        self.staged.retain(|(name, _)| *name != file_name);
        self.staged.push((file_name.clone(), staging));
        AssetHandle::new(file_name)
    }

    fn write_json<T: Serialize>(&mut self, value: &T, file_name: String) -> Result<AssetHandle, BakeError> {
        let staging = self.staging_path(&file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&staging, json)?;
        debug!("Staged {}", staging.display());
        Ok(self.stage(file_name, staging))
    }

    /// Sets existing targets aside, then renames staged files over them.
    /// Every completed step is recorded so a failure can be undone.
    fn place_staged(
        &self,
        backups: &mut Vec<(PathBuf, PathBuf)>,
        placed: &mut Vec<(PathBuf, PathBuf)>,
    ) -> std::io::Result<()> {
        for (file_name, _) in &self.staged {
            let target = self.output_dir.join(file_name);
            if fs::symlink_metadata(&target).is_ok() {
                let backup = self.output_dir.join(format!("{}.backup", file_name));
                fs::rename(&target, &backup)?;
                backups.push((target, backup));
            }
        }
        for (file_name, staging) in &self.staged {
            let target = self.output_dir.join(file_name);
            fs::rename(staging, &target)?;
            placed.push((staging.clone(), target));
        }
        Ok(())
    }
}

/// Returns placed files to staging and restores the files they replaced.
fn roll_back(placed: &[(PathBuf, PathBuf)], backups: &[(PathBuf, PathBuf)]) {
    for (staging, target) in placed.iter().rev() {
        if let Err(err) = fs::rename(target, staging) {
            warn!("Could not unstage {}: {}", target.display(), err);
        }
    }
    for (target, backup) in backups.iter().rev() {
        if let Err(err) = fs::rename(backup, target) {
            warn!("Could not restore {}: {}", target.display(), err);
        }
    }
}

impl Persistence for FilePersistence {
    fn store_texture(
        &mut self,
        texture: &PackedTexture,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        let file_name = texture_file_name(texture, name);
        let staging = self.staging_path(&file_name);

        if file_name.ends_with(".png") {
            let image = RgbaImage::from_raw(texture.width, texture.height, texture.data.clone())
                .ok_or_else(|| {
                    BakeError::Persistence(format!(
                        "{} texel bytes do not fill a {}x{} image",
                        texture.data.len(),
                        texture.width,
                        texture.height
                    ))
                })?;
            image.save_with_format(&staging, ImageFormat::Png)?;
        } else {
            write_packed_dds(&staging, texture)?;
        }

        debug!(
            "Staged {} texture {}x{}x{} at {}",
            texture.channel.name(),
            texture.width,
            texture.height,
            texture.layers,
            staging.display()
        );
        Ok(self.stage(file_name, staging))
    }

    fn store_mesh(&mut self, mesh: &ProxyMesh, name: &str) -> Result<AssetHandle, BakeError> {
        self.write_json(mesh, format!("{}.mesh.json", name))
    }

    fn store_manifest(
        &mut self,
        manifest: &ImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        self.write_json(manifest, format!("{}.json", name))
    }

    fn store_true_impostor_manifest(
        &mut self,
        manifest: &TrueImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        self.write_json(manifest, format!("{}.json", name))
    }

    /// Moves every staged file into place, or none of them. Files a
    /// commit replaces are set aside as `.backup` and restored on failure.
    fn commit(&mut self) -> Result<(), BakeError> {
        let mut backups = Vec::new();
        let mut placed = Vec::new();

        if let Err(err) = self.place_staged(&mut backups, &mut placed) {
            roll_back(&placed, &backups);
            return Err(BakeError::Persistence(format!(
                "failed to commit into {}: {}",
                self.output_dir.display(),
                err
            )));
        }

        for (_, backup) in &backups {
            if let Err(err) = fs::remove_file(backup) {
                warn!("Could not remove {}: {}", backup.display(), err);
            }
        }
        info!(
            "Committed {} assets to {}",
            self.staged.len(),
            self.output_dir.display()
        );
        self.staged.clear();
        Ok(())
    }

    fn discard(&mut self) {
        for (_, staging) in self.staged.drain(..) {
            if let Err(err) = fs::remove_file(&staging) {
                warn!("Could not remove {}: {}", staging.display(), err);
            }
        }
    }

    fn load_texture(
        &self,
        handle: &AssetHandle,
        channel: Channel,
    ) -> Result<PackedTexture, BakeError> {
        let path = self.output_dir.join(handle.as_str());
        if !path.is_file() {
            return Err(BakeError::Persistence(format!(
                "no committed asset at {}",
                path.display()
            )));
        }

        if handle.as_str().ends_with(".png") {
            if channel != Channel::Color {
                return Err(BakeError::Persistence(format!(
                    "{} holds colour data, requested {}",
                    path.display(),
                    channel.name()
                )));
            }
            let image = image::open(&path)?.to_rgba8();
            Ok(PackedTexture {
                channel,
                width: image.width(),
                height: image.height(),
                layers: 1,
                data: image.into_raw(),
            })
        } else {
            read_packed_dds(&path, channel)
        }
    }
}

impl Drop for FilePersistence {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            warn!("Discarding {} uncommitted assets", self.staged.len());
            self.discard();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredAsset {
    Texture(PackedTexture),
    Mesh(ProxyMesh),
    Manifest(ImpostorManifest),
    TrueImpostorManifest(TrueImpostorManifest),
}

/// Keeps assets in memory; used for previews and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    staged: HashMap<String, StoredAsset>,
    committed: HashMap<String, StoredAsset>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &HashMap<String, StoredAsset> {
        &self.committed
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    pub fn get(&self, handle: &AssetHandle) -> Option<&StoredAsset> {
        self.committed.get(handle.as_str())
    }

    fn stage(&mut self, file_name: String, asset: StoredAsset) -> AssetHandle {
        self.staged.insert(file_name.clone(), asset);
        AssetHandle::new(file_name)
    }
}

impl Persistence for MemoryPersistence {
    fn store_texture(
        &mut self,
        texture: &PackedTexture,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        let file_name = texture_file_name(texture, name);
        Ok(self.stage(file_name, StoredAsset::Texture(texture.clone())))
    }

    fn store_mesh(&mut self, mesh: &ProxyMesh, name: &str) -> Result<AssetHandle, BakeError> {
        Ok(self.stage(format!("{}.mesh.json", name), StoredAsset::Mesh(mesh.clone())))
    }

    fn store_manifest(
        &mut self,
        manifest: &ImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        Ok(self.stage(
            format!("{}.json", name),
            StoredAsset::Manifest(manifest.clone()),
        ))
    }

    fn store_true_impostor_manifest(
        &mut self,
        manifest: &TrueImpostorManifest,
        name: &str,
    ) -> Result<AssetHandle, BakeError> {
        Ok(self.stage(
            format!("{}.json", name),
            StoredAsset::TrueImpostorManifest(manifest.clone()),
        ))
    }

    fn commit(&mut self) -> Result<(), BakeError> {
        self.committed.extend(self.staged.drain());
        Ok(())
    }

    fn discard(&mut self) {
        self.staged.clear();
    }

    fn load_texture(
        &self,
        handle: &AssetHandle,
        channel: Channel,
    ) -> Result<PackedTexture, BakeError> {
        match self.get(handle) {
            Some(StoredAsset::Texture(texture)) if texture.channel == channel => Ok(texture.clone()),
            Some(_) => Err(BakeError::Persistence(format!(
                "{} is not a {} texture",
                handle,
                channel.name()
            ))),
            None => Err(BakeError::Persistence(format!("no committed asset {}", handle))),
        }
    }
}
