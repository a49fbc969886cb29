// src/main.rs
// Guidance demo: walks a simulated agent along a planned route and logs the
// guidance produced at each pose update.
//
// Usage: guidance_demo [config.yaml|-] [graph.txt] [route, e.g. 1,2,3,4]
// Without a graph file a built-in demo graph and route are used.

use env_logger::Env;
use log::{error, info, warn};
use route_guidance::{
    GuidanceConfig, GuidanceManager, Id, Map, NodeType, Path, RoadGraph, TopometricPose,
};
use std::error::Error;

/// Builds a small block: 1 -> 2 -> 3 -> 4 with a detour 1 -> 5 -> 3
fn demo_graph() -> route_guidance::Result<RoadGraph> {
    let mut graph = RoadGraph::new();
    graph.add_node(1, 0.0, 0.0)?;
    graph.add_node(2, 30.0, 0.0)?;
    graph.add_node(3, 30.0, 20.0)?;
    graph.add_node(4, 50.0, 20.0)?;
    graph.add_node(5, 0.0, 20.0)?;
    for (a, b) in [(1, 2), (2, 3), (3, 4), (1, 5), (5, 3)] {
        graph.add_road(a, b, -1.0)?;
    }
    Ok(graph)
}

fn parse_route(text: &str) -> Result<Vec<Id>, Box<dyn Error>> {
    let mut route = Vec::new();
    for token in text.split(',') {
        route.push(token.trim().parse::<Id>()?);
    }
    Ok(route)
}

/// Poses sampled along each leg of the route, ending on the destination
fn simulated_poses(map: &Map, route: &[Id]) -> Vec<TopometricPose> {
    let mut poses = Vec::new();
    for pair in route.windows(2) {
        let (Some(node), Some(edge)) = (map.find_node(pair[0]), map.find_edge_between(pair[0], pair[1]))
        else {
            continue;
        };
        let Some(edge_idx) = node.edge_ids.iter().position(|&e| e == edge.id) else {
            continue;
        };
        for dist in [0.0, edge.length / 2.0, edge.length - 1.0] {
            poses.push(TopometricPose::new(pair[0], edge_idx, dist.max(0.0)));
        }
    }
    if let Some(&dest) = route.last() {
        poses.push(TopometricPose::new(dest, 0, 0.0));
    }
    poses
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting route guidance demo...");

    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.first().map(String::as_str) {
        Some(path) if path != "-" => GuidanceConfig::from_yaml_file(path)?,
        _ => GuidanceConfig::default(),
    };

    let (graph, route) = match args.get(1) {
        Some(graph_file) => {
            let mut graph = RoadGraph::new();
            graph.load(graph_file)?;
            let route = match args.get(2) {
                Some(text) => parse_route(text)?,
                None => return Err("a route is required with a graph file".into()),
            };
            (graph, route)
        }
        None => (demo_graph()?, vec![1, 2, 3, 4]),
    };

    let mut map = Map::from_road_graph(&graph)?;
    // interior waypoints are treated as street junctions
    if route.len() > 2 {
        for &id in &route[1..route.len() - 1] {
            map.set_node_type(id, NodeType::Junction)?;
        }
    }

    let path = Path::from_node_sequence(&map, &route)?;
    let poses = simulated_poses(&map, &route);

    let mut manager = GuidanceManager::new(config);
    manager.initiate_new_guidance(path, map, 0)?;
    info!("Guiding along route {:?}", route);

    for pose in poses {
        match manager.update(pose, 0.9) {
            Ok(status) => {
                let guidance = manager.guidance();
                info!(
                    "node {} +{:.1}m -> {:?}: {}",
                    pose.node_id, pose.dist, status, guidance.msg
                );
            }
            Err(e) => warn!("node {} +{:.1}m: {}", pose.node_id, pose.dist, e),
        }
    }

    if manager.guidance().guide_status.is_failure() {
        error!("Demo ended without arriving");
    }
    info!(
        "Route guidance demo completed ({} archived guidances)",
        manager.past_guidances().count()
    );
    Ok(())
}
