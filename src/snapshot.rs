//! Whole-collection backup files.
//!
//! Layout: a validated rkyv archive of [`Snapshot`]. Point order is not kept
//! meaningful; restore yields the same point set.

use std::path::Path;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

use crate::error::{Error, Result};
use crate::model::{PayloadValue, Point, RecordKind};
use crate::schema::VectorField;

#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct SnapshotField {
    pub name: String,
    pub value: PayloadValue,
}

#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct SnapshotVector {
    pub name: String,
    pub values: Vec<f32>,
}

#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct SnapshotPoint {
    pub key: String,
    pub payload: Vec<SnapshotField>,
    pub vectors: Vec<SnapshotVector>,
}

#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Snapshot {
    pub collection: String,
    /// Record kind of the source collection, as displayed by `RecordKind`.
    pub kind: String,
    pub vector_field: String,
    pub dimension: u32,
    pub points: Vec<SnapshotPoint>,
}

impl Snapshot {
    pub fn from_points(collection: &str, kind: RecordKind, field: &VectorField, points: Vec<Point>) -> Self {
        let points = points
            .into_iter()
            .map(|p| SnapshotPoint {
                key: p.key,
                payload: p
                    .payload
                    .into_iter()
                    .map(|(name, value)| SnapshotField { name, value })
                    .collect(),
                vectors: p
                    .vectors
                    .into_iter()
                    .map(|(name, values)| SnapshotVector { name, values })
                    .collect(),
            })
            .collect();

        Self {
            collection: collection.to_string(),
            kind: kind.to_string(),
            vector_field: field.name.to_string(),
            dimension: field.dimension as u32,
            points,
        }
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
            .into_iter()
            .map(|p| Point {
                key: p.key,
                payload: p.payload.into_iter().map(|f| (f.name, f.value)).collect(),
                vectors: p.vectors.into_iter().map(|v| (v.name, v.values)).collect(),
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<_, 4096>(self).map_err(|e| Error::Snapshot(e.to_string()))?;
        Ok(bytes.into_vec())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        // Archives must be read from aligned memory
        let mut aligned = rkyv::AlignedVec::with_capacity(data.len());
        aligned.extend_from_slice(data);

        rkyv::from_bytes::<Snapshot>(&aligned).map_err(|e| Error::Snapshot(format!("corrupt snapshot: {:?}", e)))
    }
}

pub async fn write_file(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = snapshot.to_bytes()?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

pub async fn read_file(path: &Path) -> Result<Snapshot> {
    let data = tokio::fs::read(path).await?;
    Snapshot::from_bytes(&data)
}
