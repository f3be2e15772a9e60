use artifact::specs::ActFnSpec;

use super::Relu;

#[derive(Clone, Copy, Debug)]
pub enum ActFn {
    Relu(Relu),
}

impl ActFn {
    pub fn relu() -> Self {
        ActFn::Relu(Relu::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            ActFn::Relu(a) => a.df(x),
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Relu => ActFn::relu(),
        }
    }
}
