//! Loading input images and writing generated ones.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Serialize;
use shared::{
    domain::{ImageRef, WardrobeItem},
    wardrobe::find_item,
};
use tryon_core::{OutfitHistory, PoseCatalog};

pub async fn read_image_file(path: &Path) -> Result<ImageRef> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        bail!("'{}' is not an image file ({mime})", path.display());
    }
    Ok(ImageRef::from_bytes(mime.essence_str(), &bytes))
}

/// Resolves a `--garment` argument: a wardrobe id, or else a path to a local image.
pub async fn load_garment(
    http: &Client,
    wardrobe: &[WardrobeItem],
    garment: &str,
) -> Result<(WardrobeItem, ImageRef)> {
    if let Some(item) = find_item(wardrobe, garment) {
        let image = fetch_image(http, &item.source_url).await?;
        return Ok((item.clone(), image));
    }

    let path = PathBuf::from(garment);
    let image = read_image_file(&path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| garment.to_string());
    Ok((
        WardrobeItem::custom(name, format!("file://{}", path.display())),
        image,
    ))
}

async fn fetch_image(http: &Client, url: &str) -> Result<ImageRef> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch wardrobe image {url}"))?
        .error_for_status()?;
    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| value.starts_with("image/"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(url.split('?').next().unwrap_or(url))
                .first_or(mime_guess::mime::IMAGE_PNG)
                .essence_str()
                .to_string()
        });
    let bytes = response.bytes().await?;
    Ok(ImageRef::from_bytes(&mime, &bytes))
}

pub fn extension_for(image: &ImageRef) -> &'static str {
    match image.mime_type_or_default() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

#[derive(Debug, Serialize)]
struct ManifestLayer {
    garment: Option<String>,
    color: Option<String>,
    images: Vec<ManifestImage>,
}

#[derive(Debug, Serialize)]
struct ManifestImage {
    pose: String,
    file: String,
}

#[derive(Debug, Serialize)]
struct Manifest {
    position: usize,
    display: Option<String>,
    layers: Vec<ManifestLayer>,
}

/// Writes the displayed image, every cached layer image and a `session.json` index.
pub async fn write_session(
    out_dir: &Path,
    history: &OutfitHistory,
    poses: &PoseCatalog,
    display: Option<&ImageRef>,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create output directory '{}'", out_dir.display()))?;
    let mut written = Vec::new();

    let display_file = match display {
        Some(image) => {
            let file = format!("display.{}", extension_for(image));
            write_image(&out_dir.join(&file), image).await?;
            written.push(out_dir.join(&file));
            Some(file)
        }
        None => None,
    };

    let mut layers = Vec::new();
    for (layer_index, layer) in history.layers().iter().enumerate() {
        let mut images = Vec::new();
        for (pose, image) in layer.pose_images().iter() {
            let pose_slot = poses
                .index_of(pose)
                .map(|index| index.to_string())
                .unwrap_or_else(|| "x".to_string());
            let file = format!(
                "layer-{layer_index}-pose-{pose_slot}.{}",
                extension_for(image)
            );
            write_image(&out_dir.join(&file), image).await?;
            written.push(out_dir.join(&file));
            images.push(ManifestImage {
                pose: pose.to_string(),
                file,
            });
        }
        layers.push(ManifestLayer {
            garment: layer
                .garment
                .as_ref()
                .map(|garment| garment.display_name.clone()),
            color: layer.color.clone(),
            images,
        });
    }

    let manifest = Manifest {
        position: history.position(),
        display: display_file,
        layers,
    };
    let manifest_path = out_dir.join("session.json");
    tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
        .await
        .with_context(|| format!("failed to write '{}'", manifest_path.display()))?;
    written.push(manifest_path);

    Ok(written)
}

async fn write_image(path: &Path, image: &ImageRef) -> Result<()> {
    let bytes = image
        .decode_bytes()
        .with_context(|| format!("cannot decode image for '{}'", path.display()))?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_common_extensions_from_mime() {
        assert_eq!(extension_for(&ImageRef::from("data:image/jpeg;base64,AA==")), "jpg");
        assert_eq!(extension_for(&ImageRef::from("data:image/webp;base64,AA==")), "webp");
        assert_eq!(extension_for(&ImageRef::from("opaque-handle")), "png");
    }

    #[tokio::test]
    async fn rejects_non_image_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");
        assert!(read_image_file(&path).await.is_err());
    }

    #[tokio::test]
    async fn local_garment_paths_become_custom_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shirt.png");
        std::fs::write(&path, [1u8, 2, 3]).expect("write");

        let (item, image) = load_garment(&Client::new(), &[], path.to_str().expect("utf8 path"))
            .await
            .expect("garment");
        assert!(item.is_custom());
        assert_eq!(item.display_name, "shirt.png");
        assert_eq!(image.mime_type_or_default(), "image/png");
        assert_eq!(image.decode_bytes().expect("bytes"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn writes_display_layers_and_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let poses = PoseCatalog::default();
        let mut history = OutfitHistory::new();
        history.seed_base(poses.first(), ImageRef::from_bytes("image/png", b"base"));
        history.append_layer(
            WardrobeItem::new("red-dress", "Red Dress", "https://example.test/dress.png"),
            poses.first(),
            ImageRef::from_bytes("image/jpeg", b"dressed"),
            Some("crimson".into()),
        );
        let display = ImageRef::from_bytes("image/jpeg", b"dressed");

        let written = write_session(dir.path(), &history, &poses, Some(&display))
            .await
            .expect("write session");

        assert_eq!(written.len(), 4);
        assert_eq!(
            std::fs::read(dir.path().join("layer-1-pose-0.jpg")).expect("layer file"),
            b"dressed"
        );
        let manifest: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("session.json")).expect("manifest"),
        )
        .expect("json");
        assert_eq!(manifest["position"], 1);
        assert_eq!(manifest["display"], "display.jpg");
        assert_eq!(manifest["layers"][1]["garment"], "Red Dress");
        assert_eq!(manifest["layers"][1]["color"], "crimson");
    }
}
