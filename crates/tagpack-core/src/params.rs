//! # Parameter Packing
//!
//! Flattens the ordered parameter tensors of a tagger into one binary file:
//!
//! ```text
//! u64            P, the number of parameters
//! u64 * P        element count of each parameter
//! f32 * sum      every parameter, row-major, in order
//! ```
//!
//! Readers index parameters by position, so the input order is kept exactly.
//! Parameters named `*weight*` are stored transposed. Optionally the first
//! parameter, the CRF transition matrix, has its start/stop states trimmed.

use std::io::{Read, Write};
use std::path::Path;

use candle_core::{DType, Tensor};

use crate::config::ExportConfig;
use crate::error::{Result, TagpackError};
use crate::format::{
    expect_eof, open_input, read_f32s, read_u64, read_u64s, to_len, write_f32s, write_file,
    write_u64, write_u64s,
};

/// Parameters whose name contains this marker are transposed.
pub const WEIGHT_MARKER: &str = "weight";

/// A model parameter and its name.
#[derive(Debug, Clone)]
pub struct NamedTensor {
    pub name: String,
    pub tensor: Tensor,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            name: name.into(),
            tensor,
        }
    }
}

/// A parameter after transposition/trimming, flattened to f32.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedTensor {
    pub name: String,
    /// Shape of the stored layout (after any transpose)
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl PackedTensor {
    /// Flattened element count.
    pub fn numel(&self) -> usize {
        self.values.len()
    }
}

/// Packs named tensors into the flat parameter format.
#[derive(Debug, Clone, Default)]
pub struct ParameterPacker {
    trim_transitions: bool,
}

impl ParameterPacker {
    /// Create a packer that leaves the transition matrix untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packer following an export configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new().with_trim_transitions(config.trim_transitions)
    }

    /// Enable or disable CRF transition trimming.
    pub fn with_trim_transitions(mut self, enabled: bool) -> Self {
        self.trim_transitions = enabled;
        self
    }

    /// Apply the packing transformations and flatten every parameter.
    pub fn prepare(&self, params: Vec<NamedTensor>) -> Result<Vec<PackedTensor>> {
        if params.is_empty() {
            return Err(TagpackError::EmptyParameters);
        }

        let mut params = params
            .into_iter()
            .map(orient)
            .collect::<Result<Vec<_>>>()?;

        if self.trim_transitions {
            trim_transitions(&mut params)?;
        }

        params.iter().map(flatten).collect()
    }

    /// Pack `params` into `writer`.
    pub fn write<W: Write>(&self, params: Vec<NamedTensor>, writer: &mut W) -> Result<Vec<PackedTensor>> {
        let packed = self.prepare(params)?;
        write_packed(&packed, writer).map_err(|source| TagpackError::Stream {
            stage: "write packed parameters",
            source,
        })?;
        Ok(packed)
    }

    /// Pack `params` into the file at `path`.
    pub fn pack_to_file(
        &self,
        params: Vec<NamedTensor>,
        path: impl AsRef<Path>,
    ) -> Result<Vec<PackedTensor>> {
        let path = path.as_ref();
        let packed = self.prepare(params)?;
        write_file(path, "write packed parameters", |w| write_packed(&packed, w))?;

        tracing::info!(
            path = %path.display(),
            parameters = packed.len(),
            values = packed.iter().map(PackedTensor::numel).sum::<usize>(),
            "wrote packed parameters"
        );
        Ok(packed)
    }
}

/// Transpose `*weight*` matrices; other parameters pass through.
fn orient(param: NamedTensor) -> Result<NamedTensor> {
    if !param.name.contains(WEIGHT_MARKER) {
        return Ok(param);
    }

    match param.tensor.rank() {
        0 | 1 => Ok(param),
        2 => Ok(NamedTensor {
            tensor: param.tensor.t()?,
            name: param.name,
        }),
        rank => Err(TagpackError::InvalidParameter {
            name: param.name,
            reason: format!("cannot transpose a rank-{} tensor", rank),
        }),
    }
}

/// Trim the start/stop states out of the transition matrix in `params[0]`.
///
/// For a matrix `T` of shape `[R, C]` the row `T[R-2, :]` and the column
/// `T[:, C-1]` are removed from `T` and inserted as standalone parameters at
/// positions 1 and 2. What remains, shape `[R-1, C-1]`, replaces `T`.
pub fn trim_transitions(params: &mut Vec<NamedTensor>) -> Result<()> {
    let first = params.first().ok_or(TagpackError::EmptyParameters)?;
    let name = first.name.clone();
    let (rows, cols) = first
        .tensor
        .dims2()
        .map_err(|_| TagpackError::InvalidParameter {
            name: name.clone(),
            reason: format!(
                "transition matrix must be 2-D, got shape {:?}",
                first.tensor.dims()
            ),
        })?;
    if rows < 2 || cols < 2 {
        return Err(TagpackError::InvalidParameter {
            name,
            reason: format!("transition matrix {}x{} is too small to trim", rows, cols),
        });
    }

    let transitions = &first.tensor;
    let removed_row = transitions.get(rows - 2)?;
    let removed_column = transitions.narrow(1, cols - 1, 1)?.squeeze(1)?;

    let kept = transitions.narrow(1, 0, cols - 1)?;
    let last = kept.narrow(0, rows - 1, 1)?;
    let trimmed = if rows > 2 {
        Tensor::cat(&[&kept.narrow(0, 0, rows - 2)?, &last], 0)?
    } else {
        last
    };

    tracing::debug!(
        parameter = %name,
        from = ?(rows, cols),
        to = ?trimmed.dims(),
        "trimmed transition matrix"
    );

    params[0].tensor = trimmed;
    params.insert(1, NamedTensor::new(format!("{}.removed_row", name), removed_row));
    params.insert(2, NamedTensor::new(format!("{}.removed_column", name), removed_column));
    Ok(())
}

fn flatten(param: &NamedTensor) -> Result<PackedTensor> {
    let shape = param.tensor.dims().to_vec();
    let values = param
        .tensor
        .to_dtype(DType::F32)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<f32>()?;

    tracing::debug!(parameter = %param.name, shape = ?shape, "packed parameter");
    Ok(PackedTensor {
        name: param.name.clone(),
        shape,
        values,
    })
}

/// Write already prepared parameters.
pub fn write_packed<W: Write>(packed: &[PackedTensor], writer: &mut W) -> std::io::Result<()> {
    write_u64(writer, packed.len() as u64)?;
    let sizes: Vec<u64> = packed.iter().map(|p| p.numel() as u64).collect();
    write_u64s(writer, &sizes)?;
    for param in packed {
        write_f32s(writer, &param.values)?;
    }
    Ok(())
}

/// A packed parameter file read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedParameters {
    tensors: Vec<Vec<f32>>,
}

impl PackedParameters {
    /// Parse the binary form, requiring the stream to end after the last value.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let count = to_len(read_u64(reader)?, "parameter count")?;
        let sizes = read_u64s(reader, count)?;

        let mut tensors = Vec::with_capacity(sizes.len());
        for size in sizes {
            tensors.push(read_f32s(reader, to_len(size, "parameter size")?)?);
        }
        expect_eof(reader)?;

        Ok(Self { tensors })
    }

    /// Read a packed parameter file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(&mut open_input(path, "open packed parameters")?)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Element count of each parameter, in file order.
    pub fn sizes(&self) -> Vec<usize> {
        self.tensors.iter().map(Vec::len).collect()
    }

    /// Flattened values of the parameter at `index`.
    pub fn tensor(&self, index: usize) -> Option<&[f32]> {
        self.tensors.get(index).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn matrix(rows: usize, cols: usize) -> Tensor {
        Tensor::arange(0f32, (rows * cols) as f32, &Device::Cpu)
            .unwrap()
            .reshape((rows, cols))
            .unwrap()
    }

    fn vector(values: &[f32]) -> Tensor {
        Tensor::new(values, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_weight_is_transposed() {
        let packed = ParameterPacker::new()
            .prepare(vec![
                NamedTensor::new("linear.weight", matrix(3, 4)),
                NamedTensor::new("linear.bias", vector(&[1.0, 2.0, 3.0, 4.0, 5.0])),
            ])
            .unwrap();

        assert_eq!(packed[0].shape, vec![4, 3]);
        assert_eq!(
            packed[0].values,
            vec![0.0, 4.0, 8.0, 1.0, 5.0, 9.0, 2.0, 6.0, 10.0, 3.0, 7.0, 11.0]
        );
        assert_eq!(packed[1].shape, vec![5]);
        assert_eq!(packed[1].values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_non_weight_matrix_is_untouched() {
        let packed = ParameterPacker::new()
            .prepare(vec![NamedTensor::new("transitions", matrix(2, 3))])
            .unwrap();
        assert_eq!(packed[0].shape, vec![2, 3]);
        assert_eq!(packed[0].values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_one_dimensional_weight_passes_through() {
        let packed = ParameterPacker::new()
            .prepare(vec![NamedTensor::new("norm.weight", vector(&[1.0, 2.0]))])
            .unwrap();
        assert_eq!(packed[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_rank_three_weight_is_rejected() {
        let tensor = Tensor::zeros((2, 2, 2), DType::F32, &Device::Cpu).unwrap();
        let err = ParameterPacker::new()
            .prepare(vec![NamedTensor::new("conv.weight", tensor)])
            .unwrap_err();
        assert!(matches!(err, TagpackError::InvalidParameter { .. }));
    }

    #[test]
    fn test_empty_parameter_list() {
        let err = ParameterPacker::new().prepare(Vec::new()).unwrap_err();
        assert!(matches!(err, TagpackError::EmptyParameters));
    }

    #[test]
    fn test_non_f32_tensors_are_cast() {
        let tensor = Tensor::new(&[1.5f64, -2.0], &Device::Cpu).unwrap();
        let packed = ParameterPacker::new()
            .prepare(vec![NamedTensor::new("scale", tensor)])
            .unwrap();
        assert_eq!(packed[0].values, vec![1.5, -2.0]);
    }

    #[test]
    fn test_trim_transitions() {
        // 4 x 4:
        //  0  1  2  3
        //  4  5  6  7
        //  8  9 10 11   <- removed row
        // 12 13 14 15
        //           ^ removed column
        let packed = ParameterPacker::new()
            .with_trim_transitions(true)
            .prepare(vec![
                NamedTensor::new("transitions", matrix(4, 4)),
                NamedTensor::new("linear.bias", vector(&[9.0])),
            ])
            .unwrap();

        assert_eq!(packed.len(), 4);
        assert_eq!(packed[0].shape, vec![3, 3]);
        assert_eq!(
            packed[0].values,
            vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 12.0, 13.0, 14.0]
        );
        assert_eq!(packed[1].name, "transitions.removed_row");
        assert_eq!(packed[1].values, vec![8.0, 9.0, 10.0, 11.0]);
        assert_eq!(packed[2].name, "transitions.removed_column");
        assert_eq!(packed[2].values, vec![3.0, 7.0, 11.0, 15.0]);
        assert_eq!(packed[3].values, vec![9.0]);
    }

    #[test]
    fn test_trim_rectangular_matrix() {
        let mut params = vec![NamedTensor::new("transitions", matrix(4, 3))];
        trim_transitions(&mut params).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].tensor.dims(), &[3, 2]);
        assert_eq!(params[1].tensor.dims(), &[3]);
        assert_eq!(params[2].tensor.dims(), &[4]);
    }

    #[test]
    fn test_trim_two_row_matrix_keeps_last_row() {
        let mut params = vec![NamedTensor::new("transitions", matrix(2, 2))];
        trim_transitions(&mut params).unwrap();
        let kept = params[0].tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(kept, vec![2.0]);
    }

    #[test]
    fn test_trim_rejects_vectors() {
        let mut params = vec![NamedTensor::new("transitions", vector(&[1.0, 2.0]))];
        assert!(trim_transitions(&mut params).is_err());

        let mut params = vec![NamedTensor::new("transitions", matrix(1, 3))];
        assert!(trim_transitions(&mut params).is_err());
    }

    #[test]
    fn test_write_layout() {
        let mut buf = Vec::new();
        ParameterPacker::new()
            .write(
                vec![
                    NamedTensor::new("a", vector(&[1.0, 2.0])),
                    NamedTensor::new("b", vector(&[3.0])),
                ],
                &mut buf,
            )
            .unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&1u64.to_le_bytes());
        for v in [1.0f32, 2.0, 3.0] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_read_back_packed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wnut17.model");

        let packed = ParameterPacker::new()
            .pack_to_file(
                vec![
                    NamedTensor::new("transitions", matrix(3, 3)),
                    NamedTensor::new("rnn.weight_ih_l0", matrix(2, 5)),
                    NamedTensor::new("rnn.bias_ih_l0", vector(&[0.5, 0.25])),
                ],
                &path,
            )
            .unwrap();

        let read = PackedParameters::read(&path).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read.sizes(), vec![9, 10, 2]);
        for (i, p) in packed.iter().enumerate() {
            assert_eq!(read.tensor(i), Some(p.values.as_slice()));
        }

        let declared: usize = read.sizes().iter().sum();
        let file_len = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(file_len, 8 + 8 * read.len() + 4 * declared);
    }

    #[test]
    fn test_repacking_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.model");
        let b = dir.path().join("b.model");
        let params = || {
            vec![
                NamedTensor::new("transitions", matrix(4, 4)),
                NamedTensor::new("linear.weight", matrix(2, 3)),
            ]
        };
        let packer = ParameterPacker::new().with_trim_transitions(true);
        packer.pack_to_file(params(), &a).unwrap();
        packer.pack_to_file(params(), &b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn test_parse_rejects_short_and_long_files() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 1).unwrap();
        write_u64(&mut buf, 2).unwrap();
        write_f32s(&mut buf, &[1.0]).unwrap();
        assert!(PackedParameters::parse(&mut buf.as_slice()).is_err());

        write_f32s(&mut buf, &[2.0, 3.0]).unwrap();
        assert!(PackedParameters::parse(&mut buf.as_slice()).is_err());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_stream_error() {
        let err = ParameterPacker::new()
            .write(vec![NamedTensor::new("linear.bias", vector(&[1.0]))], &mut FullDisk)
            .unwrap_err();
        match err {
            TagpackError::Stream { stage, source } => {
                assert_eq!(stage, "write packed parameters");
                assert_eq!(source.kind(), std::io::ErrorKind::StorageFull);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_huge_declared_sizes() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 1).unwrap();
        write_u64(&mut buf, 1 << 62).unwrap();
        write_f32s(&mut buf, &[1.0]).unwrap();
        let err = PackedParameters::parse(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TagpackError::Format(_)));

        let mut buf = Vec::new();
        write_u64(&mut buf, u64::MAX).unwrap();
        let err = PackedParameters::parse(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TagpackError::Format(_)));
    }
}
