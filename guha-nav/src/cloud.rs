//! Point-cloud wire format.
//!
//! Clouds are row-major arrays of little-endian 32-bit floats with named
//! fields, the same layout the rest of the fleet publishes. Only float32
//! fields are supported; validation rejects anything else before it reaches
//! the map.

use nalgebra::Vector3;

use naksha_map::MapPoint;

use crate::error::{NavError, Result};

/// Field datatype tag for 32-bit floats.
pub const FLOAT32: u8 = 7;

/// A named field inside each point record.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudField {
    pub name: String,
    /// Byte offset inside the point record.
    pub offset: usize,
    pub datatype: u8,
}

/// A stamped point cloud in a named frame.
#[derive(Clone, Debug)]
pub struct PointCloud {
    pub frame_id: String,
    /// Seconds since init.
    pub stamp: f64,
    pub width: usize,
    pub height: usize,
    pub point_step: usize,
    pub row_step: usize,
    pub fields: Vec<CloudField>,
    pub data: Vec<u8>,
}

impl PointCloud {
    /// Build an xyz cloud from positions.
    pub fn from_points(frame_id: &str, stamp: f64, points: &[Vector3<f32>]) -> Self {
        let mut builder = CloudBuilder::new(points.len());
        builder.push_vec3("x", points.iter().copied());
        builder.finish(frame_id, stamp)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject malformed clouds: inconsistent layout, missing or non-float
    /// position fields, short data.
    pub fn validate(&self) -> Result<()> {
        if self.row_step != self.point_step * self.width {
            return Err(NavError::InvalidCloud(format!(
                "row step {} does not match point step {} x width {}",
                self.row_step, self.point_step, self.width
            )));
        }
        if self.data.len() < self.row_step * self.height {
            return Err(NavError::InvalidCloud(format!(
                "data length {} is short of {} rows x {} bytes",
                self.data.len(),
                self.height,
                self.row_step
            )));
        }
        let field = self
            .field("x")
            .ok_or_else(|| NavError::InvalidCloud("cloud without positions".into()))?;
        if field.datatype != FLOAT32 {
            return Err(NavError::InvalidCloud(format!(
                "unsupported position type {}",
                field.datatype
            )));
        }
        if field.offset + 12 > self.point_step {
            return Err(NavError::InvalidCloud(
                "position field does not fit the point step".into(),
            ));
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&CloudField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Read three consecutive floats starting at `name` for every point.
    pub fn read_vec3(&self, name: &str) -> Result<Vec<Vector3<f32>>> {
        let field = self
            .field(name)
            .ok_or_else(|| NavError::InvalidCloud(format!("missing field {}", name)))?;
        if field.datatype != FLOAT32 {
            return Err(NavError::InvalidCloud(format!(
                "unsupported type {} for field {}",
                field.datatype, name
            )));
        }
        let mut out = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let base = i * self.point_step + field.offset;
            let read = |k: usize| {
                let b = &self.data[base + 4 * k..base + 4 * k + 4];
                f32::from_le_bytes([b[0], b[1], b[2], b[3]])
            };
            out.push(Vector3::new(read(0), read(1), read(2)));
        }
        Ok(out)
    }
}

/// Incremental builder for attribute clouds.
pub struct CloudBuilder {
    len: usize,
    fields: Vec<CloudField>,
    columns: Vec<Vec<f32>>,
}

impl CloudBuilder {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            fields: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a 3-vector field; the field entry points at the first of the
    /// three consecutive components.
    pub fn push_vec3(&mut self, name: &str, values: impl Iterator<Item = Vector3<f32>>) {
        let offset = self.columns.len() * 4;
        self.fields.push(CloudField {
            name: name.to_string(),
            offset,
            datatype: FLOAT32,
        });
        let mut xs = Vec::with_capacity(self.len);
        let mut ys = Vec::with_capacity(self.len);
        let mut zs = Vec::with_capacity(self.len);
        for v in values {
            xs.push(v.x);
            ys.push(v.y);
            zs.push(v.z);
        }
        self.columns.push(xs);
        self.columns.push(ys);
        self.columns.push(zs);
    }

    /// Append a scalar field.
    pub fn push_scalar(&mut self, name: &str, values: impl Iterator<Item = f32>) {
        let offset = self.columns.len() * 4;
        self.fields.push(CloudField {
            name: name.to_string(),
            offset,
            datatype: FLOAT32,
        });
        self.columns.push(values.collect());
    }

    pub fn finish(self, frame_id: &str, stamp: f64) -> PointCloud {
        let point_step = self.columns.len() * 4;
        let mut data = Vec::with_capacity(self.len * point_step);
        for i in 0..self.len {
            for col in &self.columns {
                let v = col.get(i).copied().unwrap_or(f32::NAN);
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        PointCloud {
            frame_id: frame_id.to_string(),
            stamp,
            width: self.len,
            height: 1,
            point_step,
            row_step: point_step * self.len,
            fields: self.fields,
            data,
        }
    }
}

/// Diagnostic cloud carrying the full per-point state: positions, normals,
/// counters, label bits, and the transient plan fields.
pub fn build_map_cloud(points: &[MapPoint], frame_id: &str, stamp: f64) -> PointCloud {
    let mut builder = CloudBuilder::new(points.len());
    builder.push_vec3("x", points.iter().map(|p| p.position));
    builder.push_vec3("normal_x", points.iter().map(|p| p.normal));
    builder.push_scalar("occupied", points.iter().map(|p| f32::from(p.occupied_count)));
    builder.push_scalar("empty", points.iter().map(|p| f32::from(p.empty_count)));
    builder.push_scalar("flags", points.iter().map(|p| f32::from(p.flags.bits())));
    builder.push_scalar(
        "num_edge_neighbors",
        points.iter().map(|p| f32::from(p.num_edge_neighbors)),
    );
    builder.push_scalar("path_cost", points.iter().map(|p| p.path_cost));
    builder.push_scalar("reward", points.iter().map(|p| p.reward));
    builder.push_scalar("relative_cost", points.iter().map(|p| p.relative_cost));
    builder.finish(frame_id, stamp)
}
