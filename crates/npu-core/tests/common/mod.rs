pub mod package_server;
