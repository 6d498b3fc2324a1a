use argmin::core::{CostFunction, Gradient, Hessian};
use nalgebra::{Point3, Vector3};

use crate::{misc::FloatingPoint, volume::NurbsVolume};

/// Gradient & Hessian provider for finding the closest parameter in a volume to a given point.
pub struct VolumeClosestParameterProblem<'a, T: FloatingPoint> {
    /// The point to find the closest parameter to.
    point: &'a Point3<T>,
    /// The volume to find the closest parameter in.
    volume: &'a NurbsVolume<T>,
}

impl<'a, T: FloatingPoint> VolumeClosestParameterProblem<'a, T> {
    pub fn new(point: &'a Point3<T>, volume: &'a NurbsVolume<T>) -> Self {
        VolumeClosestParameterProblem { point, volume }
    }
}

impl<T: FloatingPoint> CostFunction for VolumeClosestParameterProblem<'_, T> {
    type Param = Vector3<T>;
    type Output = T;

    /// Distance between the volume at `param` and the target point
    fn cost(&self, param: &Self::Param) -> Result<Self::Output, anyhow::Error> {
        let p = self.volume.try_point_at(param.x, param.y, param.z)?;
        Ok((p - self.point).norm())
    }
}

impl<T: FloatingPoint> Gradient for VolumeClosestParameterProblem<'_, T> {
    type Param = Vector3<T>;
    type Gradient = Vector3<T>;

    /// Residual vector from the target point to the volume at `param`
    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, anyhow::Error> {
        let p = self.volume.try_point_at(param.x, param.y, param.z)?;
        Ok(p - self.point)
    }
}

impl<T: FloatingPoint> Hessian for VolumeClosestParameterProblem<'_, T> {
    type Param = Vector3<T>;
    type Hessian = Vec<Vec<Vec<Vector3<T>>>>;

    /// Partial derivatives of the volume up to second order
    fn hessian(&self, param: &Self::Param) -> Result<Self::Hessian, anyhow::Error> {
        Ok(self.volume.try_derivatives(param.x, param.y, param.z, 2)?)
    }
}
