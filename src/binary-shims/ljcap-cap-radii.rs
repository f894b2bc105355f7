fn main() { ::ljcap_tasks::entry_points::cap_radii(); }
