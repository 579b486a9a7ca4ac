use glam::Vec3;

#[derive(Clone, Debug, PartialEq)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl MeshBounds {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self::from_min_max(min, max))
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        let radius = (max - center).length();
        Self { min, max, center, radius }
    }

    pub fn union(&self, other: &MeshBounds) -> MeshBounds {
        MeshBounds::from_min_max(self.min.min(other.min), self.max.max(other.max))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshSummary {
    pub name: Option<String>,
    pub primitives: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub bounds: Option<MeshBounds>,
}

/// What a finished import hands to the viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedModel {
    pub source: String,
    pub meshes: Vec<MeshSummary>,
    pub materials: usize,
    pub bounds: Option<MeshBounds>,
}

impl ImportedModel {
    pub fn new(source: impl Into<String>, meshes: Vec<MeshSummary>, materials: usize) -> Self {
        let bounds = meshes
            .iter()
            .filter_map(|mesh| mesh.bounds.as_ref())
            .fold(None, |acc: Option<MeshBounds>, b| Some(acc.map_or_else(|| b.clone(), |a| a.union(b))));
        Self { source: source.into(), meshes, materials, bounds }
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.triangles).sum()
    }
}
