/*!
# Holistic schedulability analysis and assignment optimization

This crate analyzes distributed hard real-time systems modeled as sets
of linear task chains ("flows") mapped onto processors under
fixed-priority or EDF local scheduling, and searches for priority,
deadline, and mapping assignments that make such systems schedulable.

## Scope

The crate is a library core: it takes a fully populated [system::System]
from its embedding, computes worst-case response times, and answers
schedulability queries. It does not generate systems, run experiments,
or persist anything; those concerns belong to the embedding.

Three families of functionality are provided:

- [holistic]: fixed-point response-time analyses with jitter propagation
  along the flows (fixed priorities, global EDF, local EDF),
- [assignment]: deadline-distribution heuristics (PD, EQS, EQF), random
  and passthrough assigners, and the iterative HOPA redistribution,
- [gradient]: a gradient-descent optimizer over continuous
  parameterizations of priorities, deadlines, and mappings, using the
  analyses as a black-box cost.

[scenario] glues the three together behind plain configuration structs.

## Citations

The analyses implement published algorithms (Tindell-style holistic
fixed-priority analysis; the holistic EDF analyses of Palencia/Rivas et
al.). If you use this crate for academic work, please cite the paper
corresponding to the analysis you are using.
*/

pub mod analysis;
pub mod assignment;
pub mod gradient;
pub mod holistic;
pub mod scenario;
pub mod system;
pub mod time;
