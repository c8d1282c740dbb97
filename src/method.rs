use serde::{Deserialize, Serialize};

use crate::element::ElementKind;

/// Mapping method selecting how source values combine into a target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Take the value of the nearest source element.
    Nearest,
    /// Inverse-distance weighting over all source elements.
    Inverse,
    /// Unweighted mean over the covering source elements.
    Mean,
    /// Plain sum over the covering source elements.
    Sum,
    /// Overlap-weighted mean, each matrix row normalised to one.
    WeightedMean,
    /// Overlap-weighted sum, weights proportional to the overlap fraction.
    WeightedSum,
    /// Spread each source value over the targets it covers, proportional to
    /// the fraction of the source the target receives.
    Distribute,
    /// Take the value of the containing source polygon.
    Value,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Nearest => "nearest",
            Method::Inverse => "inverse",
            Method::Mean => "mean",
            Method::Sum => "sum",
            Method::WeightedMean => "weighted mean",
            Method::WeightedSum => "weighted sum",
            Method::Distribute => "distribute",
            Method::Value => "value",
        };
        f.write_str(name)
    }
}

/// One supported (method, geometry pair) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub method: Method,
    pub from: ElementKind,
    pub to: ElementKind,
    pub description: &'static str,
}

/// Every supported combination, grouped by geometry pair.
const CATALOGUE: &[MethodDescriptor] = &[
    MethodDescriptor {
        method: Method::Nearest,
        from: ElementKind::Point,
        to: ElementKind::Point,
        description: "Point-to-point nearest",
    },
    MethodDescriptor {
        method: Method::Inverse,
        from: ElementKind::Point,
        to: ElementKind::Point,
        description: "Point-to-point inverse distance",
    },
    MethodDescriptor {
        method: Method::Sum,
        from: ElementKind::Point,
        to: ElementKind::Point,
        description: "Point-to-point sum of coincident points",
    },
    MethodDescriptor {
        method: Method::Nearest,
        from: ElementKind::Point,
        to: ElementKind::PolyLine,
        description: "Point-to-polyline nearest",
    },
    MethodDescriptor {
        method: Method::Inverse,
        from: ElementKind::Point,
        to: ElementKind::PolyLine,
        description: "Point-to-polyline inverse distance",
    },
    MethodDescriptor {
        method: Method::Mean,
        from: ElementKind::Point,
        to: ElementKind::Polygon,
        description: "Point-to-polygon mean of contained points",
    },
    MethodDescriptor {
        method: Method::Sum,
        from: ElementKind::Point,
        to: ElementKind::Polygon,
        description: "Point-to-polygon sum of contained points",
    },
    MethodDescriptor {
        method: Method::Nearest,
        from: ElementKind::PolyLine,
        to: ElementKind::Point,
        description: "Polyline-to-point nearest",
    },
    MethodDescriptor {
        method: Method::Inverse,
        from: ElementKind::PolyLine,
        to: ElementKind::Point,
        description: "Polyline-to-point inverse distance",
    },
    MethodDescriptor {
        method: Method::WeightedMean,
        from: ElementKind::PolyLine,
        to: ElementKind::PolyLine,
        description: "Polyline-to-polyline weighted mean of collinear overlaps",
    },
    MethodDescriptor {
        method: Method::WeightedSum,
        from: ElementKind::PolyLine,
        to: ElementKind::PolyLine,
        description: "Polyline-to-polyline weighted sum of collinear overlaps",
    },
    MethodDescriptor {
        method: Method::WeightedMean,
        from: ElementKind::PolyLine,
        to: ElementKind::Polygon,
        description: "Polyline-to-polygon weighted mean",
    },
    MethodDescriptor {
        method: Method::WeightedSum,
        from: ElementKind::PolyLine,
        to: ElementKind::Polygon,
        description: "Polyline-to-polygon weighted sum",
    },
    MethodDescriptor {
        method: Method::Value,
        from: ElementKind::Polygon,
        to: ElementKind::Point,
        description: "Polygon-to-point value of the containing polygon",
    },
    MethodDescriptor {
        method: Method::WeightedMean,
        from: ElementKind::Polygon,
        to: ElementKind::PolyLine,
        description: "Polygon-to-polyline weighted mean",
    },
    MethodDescriptor {
        method: Method::WeightedSum,
        from: ElementKind::Polygon,
        to: ElementKind::PolyLine,
        description: "Polygon-to-polyline weighted sum",
    },
    MethodDescriptor {
        method: Method::WeightedMean,
        from: ElementKind::Polygon,
        to: ElementKind::Polygon,
        description: "Polygon-to-polygon weighted mean",
    },
    MethodDescriptor {
        method: Method::WeightedSum,
        from: ElementKind::Polygon,
        to: ElementKind::Polygon,
        description: "Polygon-to-polygon weighted sum",
    },
    MethodDescriptor {
        method: Method::Distribute,
        from: ElementKind::Polygon,
        to: ElementKind::Polygon,
        description: "Polygon-to-polygon distribution of source values",
    },
];

/// Methods available for mapping from `from` elements onto `to` elements.
///
/// Grid and mesh kinds participate through their underlying polygon geometry.
pub fn available_methods(from: ElementKind, to: ElementKind) -> Vec<MethodDescriptor> {
    CATALOGUE
        .iter()
        .filter(|d| d.from == from.base() && d.to == to.base())
        .copied()
        .collect()
}

/// Whether the catalogue defines `method` for the given geometry pair.
pub(crate) fn is_supported(method: Method, from: ElementKind, to: ElementKind) -> bool {
    CATALOGUE
        .iter()
        .any(|d| d.method == method && d.from == from.base() && d.to == to.base())
}
