//! Shared types and enums used across ETPRO.
//! Includes the `Product` catalogue with its fixed output filenames, anchor
//! kinds, calibration status, and storage `PixelType`.
use serde::{Deserialize, Serialize};

/// Storage data type of a raster on disk.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PixelType::U8 => "uint8",
            PixelType::U16 => "uint16",
            PixelType::I16 => "int16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        };
        write!(f, "{}", s)
    }
}

/// The two calibration anchors of a SEBAL run.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AnchorKind {
    Cold,
    Hot,
}

impl std::fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorKind::Cold => write!(f, "cold"),
            AnchorKind::Hot => write!(f, "hot"),
        }
    }
}

/// Terminal state of the dT calibration loop. Both are accepted as final.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Converged,
    MaxIterationsReached,
}

impl std::fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationStatus::Converged => write!(f, "Converged"),
            CalibrationStatus::MaxIterationsReached => write!(f, "MaxIterationsReached"),
        }
    }
}

/// Every raster artifact a run can persist.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Product {
    Dem,
    Composite432,
    Band(u8),
    Ndvi,
    Savi,
    Lai,
    ENbf,
    E0f,
    Ts,
    ATOA,
    Tsw,
    AS,
    Rsi,
    RLo,
    PCold,
    RLi,
    Rn,
    G,
    PHot,
    Z0Map,
    UAstMap,
    Rah,
    DT,
    H,
    L,
    L200m,
    L2m,
    L01m,
    Let,
    ETi,
    ETof,
    ETday,
}

impl Product {
    /// Fixed output filename.
    pub fn file_name(&self) -> String {
        let stem = match self {
            Product::Dem => "MDT_Sebal_recorte",
            Product::Composite432 => "CC_432",
            Product::Band(n) => return format!("band{}.tif", n),
            Product::Ndvi => "NDVI",
            Product::Savi => "SAVI",
            Product::Lai => "LAI",
            Product::ENbf => "eNBf",
            Product::E0f => "e0f",
            Product::Ts => "Ts",
            Product::ATOA => "aTOA",
            Product::Tsw => "Tsw",
            Product::AS => "aS",
            Product::Rsi => "Rsi",
            Product::RLo => "RLo",
            Product::PCold => "Pcold",
            Product::RLi => "RLi",
            Product::Rn => "Rn",
            Product::G => "G",
            Product::PHot => "Phot",
            Product::Z0Map => "Z0map",
            Product::UAstMap => "u_astmap",
            Product::Rah => "rah",
            Product::DT => "dT",
            Product::H => "H",
            Product::L => "L",
            Product::L200m => "L200m",
            Product::L2m => "L2m",
            Product::L01m => "L01m",
            Product::Let => "LET",
            Product::ETi => "ETi",
            Product::ETof => "ETof",
            Product::ETday => "ETday",
        };
        format!("{}.tif", stem)
    }

    /// Physical unit recorded in the product tags.
    pub fn units(&self) -> &'static str {
        match self {
            Product::Dem | Product::L => "m",
            Product::Ts | Product::PCold | Product::PHot | Product::DT => "K",
            Product::Rsi
            | Product::RLo
            | Product::RLi
            | Product::Rn
            | Product::G
            | Product::H
            | Product::Let => "W/m2",
            Product::Z0Map => "m",
            Product::UAstMap => "m/s",
            Product::Rah => "s/m",
            Product::ETi => "mm/h",
            Product::ETday => "mm/day",
            _ => "dimensionless",
        }
    }

    /// Storage type used when the product is written.
    pub fn storage(&self) -> PixelType {
        match self {
            Product::ENbf | Product::E0f | Product::ATOA | Product::Tsw | Product::AS => {
                PixelType::F64
            }
            _ => PixelType::F32,
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}
