use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, Vec2, Vec3, Vec4};

/// GLSL type of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    Bool,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Parse a GLSL type name. Sampler types are set through integers.
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "uint" => Self::UInt,
            "bool" => Self::Bool,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            s if ["sampler", "isampler", "usampler"]
                .iter()
                .any(|prefix| s.starts_with(prefix)) =>
            {
                Self::Int
            }
            _ => return None,
        })
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Int => "int",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UInt => "uint",
            Self::Bool => "bool",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
        }
    }
}

/// A value to upload to a uniform, borrowed for the duration of the call.
///
/// Array variants upload `len()` consecutive elements starting at the
/// uniform's location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Int(i32),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UInt(u32),
    Bool(bool),
    Mat3(Mat3),
    Mat4(Mat4),
    FloatArray(&'a [f32]),
    Vec2Array(&'a [Vec2]),
    Vec3Array(&'a [Vec3]),
    Vec4Array(&'a [Vec4]),
    IntArray(&'a [i32]),
    IVec2Array(&'a [IVec2]),
    IVec3Array(&'a [IVec3]),
    IVec4Array(&'a [IVec4]),
    UIntArray(&'a [u32]),
    BoolArray(&'a [bool]),
    Mat3Array(&'a [Mat3]),
    Mat4Array(&'a [Mat4]),
}

impl UniformValue<'_> {
    /// Element type, regardless of array-ness.
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) | Self::FloatArray(_) => UniformKind::Float,
            Self::Vec2(_) | Self::Vec2Array(_) => UniformKind::Vec2,
            Self::Vec3(_) | Self::Vec3Array(_) => UniformKind::Vec3,
            Self::Vec4(_) | Self::Vec4Array(_) => UniformKind::Vec4,
            Self::Int(_) | Self::IntArray(_) => UniformKind::Int,
            Self::IVec2(_) | Self::IVec2Array(_) => UniformKind::IVec2,
            Self::IVec3(_) | Self::IVec3Array(_) => UniformKind::IVec3,
            Self::IVec4(_) | Self::IVec4Array(_) => UniformKind::IVec4,
            Self::UInt(_) | Self::UIntArray(_) => UniformKind::UInt,
            Self::Bool(_) | Self::BoolArray(_) => UniformKind::Bool,
            Self::Mat3(_) | Self::Mat3Array(_) => UniformKind::Mat3,
            Self::Mat4(_) | Self::Mat4Array(_) => UniformKind::Mat4,
        }
    }

    /// Number of elements uploaded: 1 for single values, the slice length for arrays.
    pub fn count(&self) -> usize {
        match self {
            Self::FloatArray(v) => v.len(),
            Self::Vec2Array(v) => v.len(),
            Self::Vec3Array(v) => v.len(),
            Self::Vec4Array(v) => v.len(),
            Self::IntArray(v) => v.len(),
            Self::IVec2Array(v) => v.len(),
            Self::IVec3Array(v) => v.len(),
            Self::IVec4Array(v) => v.len(),
            Self::UIntArray(v) => v.len(),
            Self::BoolArray(v) => v.len(),
            Self::Mat3Array(v) => v.len(),
            Self::Mat4Array(v) => v.len(),
            _ => 1,
        }
    }

    /// Flattened scalar components, column-major for matrices.
    /// Booleans become `0`/`1` integers, as the GL stores them.
    pub fn to_data(&self) -> UniformData {
        use UniformData::{Float, Int, UInt};
        match *self {
            Self::Float(x) => Float(vec![x]),
            Self::Vec2(v) => Float(v.to_array().to_vec()),
            Self::Vec3(v) => Float(v.to_array().to_vec()),
            Self::Vec4(v) => Float(v.to_array().to_vec()),
            Self::Int(x) => Int(vec![x]),
            Self::IVec2(v) => Int(v.to_array().to_vec()),
            Self::IVec3(v) => Int(v.to_array().to_vec()),
            Self::IVec4(v) => Int(v.to_array().to_vec()),
            Self::UInt(x) => UInt(vec![x]),
            Self::Bool(b) => Int(vec![i32::from(b)]),
            Self::Mat3(m) => Float(m.to_cols_array().to_vec()),
            Self::Mat4(m) => Float(m.to_cols_array().to_vec()),
            Self::FloatArray(v) => Float(v.to_vec()),
            Self::Vec2Array(v) => Float(bytemuck::cast_slice(v).to_vec()),
            Self::Vec3Array(v) => Float(bytemuck::cast_slice(v).to_vec()),
            Self::Vec4Array(v) => Float(bytemuck::cast_slice(v).to_vec()),
            Self::IntArray(v) => Int(v.to_vec()),
            Self::IVec2Array(v) => Int(bytemuck::cast_slice(v).to_vec()),
            Self::IVec3Array(v) => Int(bytemuck::cast_slice(v).to_vec()),
            Self::IVec4Array(v) => Int(bytemuck::cast_slice(v).to_vec()),
            Self::UIntArray(v) => UInt(v.to_vec()),
            Self::BoolArray(v) => Int(bools_to_ints(v)),
            Self::Mat3Array(v) => Float(bytemuck::cast_slice(v).to_vec()),
            Self::Mat4Array(v) => Float(bytemuck::cast_slice(v).to_vec()),
        }
    }
}

pub(crate) fn bools_to_ints(values: &[bool]) -> Vec<i32> {
    values.iter().map(|&b| i32::from(b)).collect()
}

/// Owned, flattened uniform contents.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Float(Vec<f32>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
}

impl UniformData {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::UInt(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
