//! Flat named-tensor container (`.lyrw`): magic, version, tensor count, then
//! per tensor a name, a shape and little-endian f32 data in row-major order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::WeightsError;

const MAGIC: &[u8; 4] = b"LYRW";
const VERSION: u32 = 1;

/// One named f32 tensor, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// JSON input for the `convert` tooling: the layout a training-side exporter
/// script dumps the Keras weights in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorDump {
    pub tensors: Vec<Tensor>,
}

/// A set of named tensors, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct WeightsContainer {
    tensors: BTreeMap<String, Tensor>,
}

impl WeightsContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tensor: Tensor) -> Result<(), WeightsError> {
        if tensor.data.len() != tensor.element_count() {
            return Err(WeightsError::BadShape {
                name: tensor.name.clone(),
                expected: format!("{} values", tensor.element_count()),
                actual: vec![tensor.data.len()],
            });
        }
        self.tensors.insert(tensor.name.clone(), tensor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Tensor, WeightsError> {
        self.tensors
            .get(name)
            .ok_or_else(|| WeightsError::MissingTensor(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self, WeightsError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(WeightsError::BadMagic);
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(WeightsError::UnsupportedVersion(version));
        }
        let count = reader.read_u32::<LittleEndian>()?;

        let mut tensors = BTreeMap::new();
        for _ in 0..count {
            let name_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;
            let name = String::from_utf8(name).map_err(|_| WeightsError::BadTensorName)?;

            let ndim = reader.read_u32::<LittleEndian>()? as usize;
            let mut shape = Vec::with_capacity(ndim);
            for _ in 0..ndim {
                shape.push(reader.read_u32::<LittleEndian>()? as usize);
            }

            let mut data = vec![0f32; shape.iter().product()];
            reader.read_f32_into::<LittleEndian>(&mut data)?;
            tensors.insert(name.clone(), Tensor { name, shape, data });
        }
        Ok(Self { tensors })
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<(), WeightsError> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(self.tensors.len() as u32)?;
        for tensor in self.tensors.values() {
            writer.write_u32::<LittleEndian>(tensor.name.len() as u32)?;
            writer.write_all(tensor.name.as_bytes())?;
            writer.write_u32::<LittleEndian>(tensor.shape.len() as u32)?;
            for &dim in &tensor.shape {
                writer.write_u32::<LittleEndian>(dim as u32)?;
            }
            for &value in &tensor.data {
                writer.write_f32::<LittleEndian>(value)?;
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WeightsError> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), WeightsError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
